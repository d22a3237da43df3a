//! `agora status`: Show the effective configuration.

use super::GlobalOpts;

pub fn run(opts: &GlobalOpts) -> anyhow::Result<()> {
    let config = opts.load_config()?;
    let c = &config.collective;

    println!("Agora Status");
    println!("============");
    println!("  Config file:  {}", opts.config_path().display());
    println!("  Domain:       {}", config.bus.domain);
    println!("  Auto-register:{}", if config.bus.auto_register { " yes" } else { " no" });
    println!("  Inbox size:   {}", config.bus.inbox_capacity);
    println!(
        "  Seed:         {}",
        config.seed.map_or_else(|| "random".to_string(), |s| s.to_string())
    );
    println!();
    println!("  Sensor:       {} every {} ms", config.bus.identity(&config.sensor.name), config.sensor.period_ms);
    println!(
        "  Rescue:       {} ({} missions, x{} time)",
        config.bus.identity(&config.rescue.name),
        config.rescue.max_missions,
        config.rescue.time_scale
    );
    println!(
        "  Collective:   {} / {} / {}",
        config.bus.identity(&c.recon),
        config.bus.identity(&c.coordinator),
        config.bus.identity(&c.watchdog)
    );
    println!(
        "  Thresholds:   escalate at {}, proceed below {}, alert at {}",
        c.escalate_at, c.proceed_below, c.alert_at
    );

    if opts.config_path().exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file, using defaults (run `agora init`)");
    }

    Ok(())
}
