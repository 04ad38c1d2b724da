// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Binary entrypoint for the flash protection rule inspector.

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    match flash_policy::execute(&args) {
        Ok(output) => println!("{output}"),
        Err(err) => {
            eprintln!("flash-policy: {err:#}");
            std::process::exit(1);
        }
    }
}
