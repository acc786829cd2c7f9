//! `rdsw codes` – list retryable conflict codes per classifier table.

use anyhow::Result;
use rdsw_core::retry::RETRY_CODE_SETS;

pub fn run_codes() -> Result<()> {
    println!("{:<20} {}", "SET", "CODE");
    for set in RETRY_CODE_SETS {
        for code in set.codes() {
            println!("{:<20} {}", set.name(), code);
        }
    }
    Ok(())
}
