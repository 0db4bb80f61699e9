use std::path::Path;

use anyhow::Result;

use crate::load_plan;

pub(crate) fn run(path: Option<&Path>) -> Result<()> {
    let plan = load_plan(path)?;
    let s = &plan.settings;
    println!(
        "settings: batch_size={} retry_attempts={} retry_delay_ms={} rate_limit_delay_ms={} page_size={} \
         validation_tolerance={} skip_existing={}",
        s.batch_size,
        s.retry_attempts,
        s.retry_delay_ms,
        s.rate_limit_delay_ms,
        s.page_size,
        s.validation_tolerance,
        s.skip_existing
    );
    for module in plan.modules() {
        let sources = module.configured_sources().count();
        let mut line = format!(
            "{:<20} {:<22} -> {:<32} {sources} source(s)",
            module.name,
            module.transform,
            module.targets.join(", ")
        );
        if !module.relations.is_empty() {
            line.push_str(&format!(", relations: {}", module.relations.join(", ")));
        }
        println!("{line}");
    }
    Ok(())
}
