// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for camera capture
//!
//! # Modules
//!
//! - [`camera`]: Camera platform traits, the callback adapter, camera/size
//!   strategy and the simulated platform

pub mod camera;
