use depsync_core::version::{version_string, SCHEMA_VERSION};
use depsync_core::VERSION;
use miette::Result;
use serde::Serialize;

#[derive(Serialize)]
struct VersionResult {
    ok: bool,
    version: &'static str,
    schema_version: u32,
}

pub fn run(json: bool) -> Result<()> {
    if json {
        super::print_json(&VersionResult {
            ok: true,
            version: VERSION,
            schema_version: SCHEMA_VERSION,
        })
    } else {
        println!("{}", version_string());
        Ok(())
    }
}
