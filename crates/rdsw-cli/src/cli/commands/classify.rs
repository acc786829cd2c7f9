//! `rdsw classify` – show the retry decision for an error response.

use anyhow::Result;
use rdsw_core::retry::{
    error_code, is_benign_timeout, is_not_found_shim, ConflictKind, ERROR_CODE_FIELDS,
};
use rdsw_core::transport::ApiFailure;

pub fn run_classify(status: u16, body: &str, kind: ConflictKind) -> Result<()> {
    let failure = ApiFailure::from_status(status, body);
    let code = error_code(body, ERROR_CODE_FIELDS).unwrap_or_else(|e| format!("- ({e})"));
    let (retry, err) = kind.classify(Some(&failure)).into_parts();

    println!("kind:           {:?}", kind);
    println!("error code:     {}", code);
    println!("retryable:      {}", retry);
    println!("not-found shim: {}", is_not_found_shim(&failure));
    println!("benign timeout: {}", is_benign_timeout(&failure));
    if let Some(err) = err {
        println!("error:          {}", err);
    }
    Ok(())
}
