// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Web demo: a lazily revealed image gallery driven by `deferral_backend_web`.
//!
//! Builds a grid of placeholder figures whose images carry `data-src`, then
//! hands them to [`lazy_media`] so each image is fetched only as it nears the
//! viewport. Captions are revealed through [`Defer::dom`] with a resolver,
//! a stylesheet is deferred until the first gesture, and any
//! `<script type="deferjs">` in the page is reinjected after load.
//!
//! Build with: `wasm-pack build --target web demos/lazy_gallery`
//!
//! Then serve `demos/lazy_gallery/` and open `index.html` in a browser.
//!
//! [`lazy_media`]: deferral_core::helpers::lazy_media
//! [`Defer::dom`]: deferral_core::defer::Defer::dom

#![no_std]
#![cfg_attr(
    not(target_arch = "wasm32"),
    allow(dead_code, reason = "this crate only runs in the browser")
)]

extern crate alloc;

use alloc::boxed::Box;
use alloc::format;

use wasm_bindgen::prelude::*;
use web_sys::{Document, Element};

use deferral_backend_web::WebHost;
use deferral_core::config::DeferConfig;
use deferral_core::defer::{Defer, DomOptions, ReinjectOptions, ResourceOptions};
use deferral_core::helpers::{MEDIA_CLASS, Throttle, lazy_media};
use deferral_core::time::Delay;
use deferral_core::watch::ObserverOptions;

const FIGURES: usize = 48;

/// Placeholder shown until the real image is revealed.
const BLANK: &str = "data:image/gif;base64,R0lGODlhAQABAAAAACw=";

/// Entry point, called automatically by `wasm_bindgen(start)`.
#[wasm_bindgen(start)]
pub fn main() -> Result<(), JsValue> {
    let host = WebHost::new().ok_or_else(|| JsValue::from_str("no window or document"))?;
    let document = host.document().clone();
    build_gallery(&document)?;

    let defer = Defer::new(host, DeferConfig::web());

    #[cfg(feature = "trace")]
    defer.set_trace_sink(Box::new(deferral_backend_web::ConsoleSink::new()));

    lazy_media(&defer);

    // Captions fade in a little after their figure, and only for odd rows.
    defer.dom(
        DomOptions::new()
            .selector("figcaption[data-row]")
            .delay(Delay(120))
            .unveiled_class("shown")
            .resolver(|caption: &Element| {
                caption
                    .get_attribute("data-row")
                    .and_then(|row| row.parse::<u32>().ok())
                    .is_some_and(|row| row % 2 == 1)
            })
            .observer(ObserverOptions::with_root_margin("0px 0px 100px 0px")),
    );

    defer.css(
        "https://fonts.googleapis.com/css2?family=Inter&display=swap",
        ResourceOptions::new().spec("gallery-font").lazy(true),
    );
    defer.all(ReinjectOptions::new());

    let status = document.get_element_by_id("status");
    let update = Throttle::new(&defer, Delay(250), move || {
        if let Some(status) = &status {
            let shown = status
                .owner_document()
                .and_then(|d| d.query_selector_all(&format!("img.{MEDIA_CLASS}")).ok())
                .map_or(0, |list| list.length());
            status.set_text_content(Some(&format!("{shown} of {FIGURES} images loaded")));
        }
    });
    let on_scroll = Closure::<dyn Fn()>::wrap(Box::new(move || update.call()));
    document.add_event_listener_with_callback("scroll", on_scroll.as_ref().unchecked_ref())?;
    on_scroll.forget();

    // The runtime lives as long as the page.
    core::mem::forget(defer);

    Ok(())
}

fn build_gallery(document: &Document) -> Result<(), JsValue> {
    let gallery = document
        .get_element_by_id("gallery")
        .ok_or_else(|| JsValue::from_str("missing #gallery"))?;
    for i in 0..FIGURES {
        let figure = document.create_element("figure")?;
        let img = document.create_element("img")?;
        img.set_attribute("src", BLANK)?;
        img.set_attribute(
            "data-src",
            &format!("https://picsum.photos/seed/deferral-{i}/520/360"),
        )?;
        img.set_attribute("alt", &format!("Photo {i}"))?;
        figure.append_child(&img)?;

        let caption = document.create_element("figcaption")?;
        caption.set_attribute("data-row", &format!("{}", i / 4))?;
        caption.set_text_content(Some(&format!("Photo {i}")));
        figure.append_child(&caption)?;

        gallery.append_child(&figure)?;
    }
    Ok(())
}
