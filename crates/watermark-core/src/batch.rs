//! Many independent documents at once
//!
//! Each document is loaded, cleaned and saved on its own, so one failure
//! never affects the others. With the `parallel` feature the work is spread
//! over rayon's global pool.

use crate::config::RemovalConfig;
use crate::error::WatermarkError;
use crate::{remove_watermarks_with, RemovalOutput};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Clean every input; results are in input order
pub fn remove_watermarks_batch<B>(
    files: &[B],
    config: &RemovalConfig,
) -> Vec<Result<RemovalOutput, WatermarkError>>
where
    B: AsRef<[u8]> + Sync,
{
    if let Err(e) = config.validate() {
        let message = e.to_string();
        return files
            .iter()
            .map(|_| Err(WatermarkError::InvalidConfig(message.clone())))
            .collect();
    }

    let clean = |file: &B| remove_watermarks_with(file.as_ref(), config);

    #[cfg(feature = "parallel")]
    return files.par_iter().map(clean).collect();

    #[cfg(not(feature = "parallel"))]
    return files.iter().map(clean).collect();
}
