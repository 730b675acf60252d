pub use anyhow::{anyhow, bail, ensure, Context};
#[cfg(feature = "logging")]
pub use log;
pub use ndarray::{Array1, ArrayView1};
pub use serde::{Deserialize, Serialize};
pub use std::ffi::OsStr;
pub use std::fs::File;
pub use std::path::Path;
pub use validator::Validate;

pub use crate::traits::*;
pub use crate::utils::{
    almost_eq, count_leading_exceeded, div_or_zero, first_not_exceeded, is_sorted,
    is_strictly_sorted,
};
