// SPDX-License-Identifier: GPL-3.0-only

//! Capture pipelines
//!
//! The photo pipeline is a set of async stages over one [`photo::SessionState`].
//! Stages are sequenced by the controller's orchestration task; none of them
//! blocks the preview, which keeps streaming until the session closes.
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Image Sink   │──▶│ Open Device  │──▶│ Create       │──▶│ Preview      │
//! │ (JPEG, 1 buf)│   │              │   │ Session      │   │ (repeating)  │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                                                 │ shutter
//!                     ┌──────────────┐   ┌──────────────┐   ┌─────▼────────┐
//!    JPEG file  ◀──── │ Saver        │◀──│ Still        │◀──│ AF ▶ AE wait │
//!                     │ (tokio::fs)  │   │ Capture      │   │              │
//!                     └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`photo`]: Session state, request controls, 3A convergence and the image saver

pub mod photo;
