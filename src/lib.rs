//! StickerFE — decorate photos with draggable, pinch-scalable, rotatable
//! image stickers, then flatten the result.
//!
//! The library surface exposes the sticker geometry (`ops`), the canvas and
//! document types, and the headless CLI pipeline; the `StickerFE` binary adds
//! the eframe window on top.

#![allow(dead_code)] // API surface kept for future features and scripting
#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod app;
pub mod assets;
pub mod canvas;
pub mod cli;
pub mod io;
pub mod ops;
pub mod project;
