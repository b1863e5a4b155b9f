//! Batch runner for the tern navigation filter.
//!
//! Flies a synthetic maneuver, feeds the noisy sensor streams through the
//! filter and writes truth vs. estimate as CSV for plotting.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tern_sim::{run, Maneuver, RunConfig, SensorConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tern-cli")]
#[command(about = "Small-UAV navigation filter test bench")]
#[command(version)]
struct Args {
    /// Maneuver to fly
    #[arg(short, long, value_enum, default_value = "hover")]
    scenario: Scenario,

    /// Flight duration, seconds
    #[arg(short, long, default_value_t = 10.0)]
    duration: f64,

    /// IMU sample rate, Hz
    #[arg(long, default_value_t = 200.0)]
    imu_rate: f64,

    /// IMU samples per GPS fix
    #[arg(long, default_value_t = 40)]
    gps_every: usize,

    /// Yaw rate for the yaw-spin maneuver, rad/s
    #[arg(long, default_value_t = 0.5)]
    yaw_rate: f64,

    /// Climb rate for the climb maneuver, m/s
    #[arg(long, default_value_t = 1.0)]
    climb_rate: f64,

    /// Scale factor applied to every sensor noise sigma
    #[arg(long, default_value_t = 1.0)]
    noise_scale: f64,

    /// Noise generator seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output CSV path
    #[arg(short, long, default_value = "output/run.csv")]
    output: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Scenario {
    Hover,
    YawSpin,
    Climb,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let maneuver = match args.scenario {
        Scenario::Hover => Maneuver::Hover,
        Scenario::YawSpin => Maneuver::YawSpin { rate: args.yaw_rate },
        Scenario::Climb => Maneuver::Climb { rate: args.climb_rate },
    };

    let cfg = RunConfig {
        maneuver,
        duration_s: args.duration,
        imu_rate_hz: args.imu_rate,
        gps_every: args.gps_every,
        sensors: SensorConfig {
            noise_scale: args.noise_scale,
            seed: args.seed,
            ..Default::default()
        },
        ..Default::default()
    };

    println!(
        "Flying {:?} for {:.1} s at {:.0} Hz...",
        args.scenario, args.duration, args.imu_rate
    );
    let result = run(&cfg);

    write_csv(&args.output, &result)?;

    let pos_err = result.final_pos_error();
    println!("\nRun complete:");
    println!("  Samples:          {}", result.time.len());
    println!(
        "  Final pos error:  {:.2} m horizontal, {:.2} m vertical",
        pos_err.xy().norm(),
        pos_err.z.abs()
    );
    println!("  Final vel error:  {:.2} m/s", result.final_vel_error().norm());
    println!("  Final yaw error:  {:.3} rad", result.final_yaw_error());
    println!("  Output at {:?}", args.output);

    Ok(())
}

fn write_csv(path: &PathBuf, result: &tern_sim::RunResult) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "t", "pos_n", "pos_e", "pos_d", "est_pos_n", "est_pos_e", "est_pos_d", "vel_n", "vel_e",
        "vel_d", "est_vel_n", "est_vel_e", "est_vel_d", "yaw", "est_yaw", "eph",
    ])?;

    for i in 0..result.time.len() {
        wtr.write_record(&[
            format!("{:.4}", result.time[i]),
            format!("{:.4}", result.truth_pos[i].x),
            format!("{:.4}", result.truth_pos[i].y),
            format!("{:.4}", result.truth_pos[i].z),
            format!("{:.4}", result.est_pos[i].x),
            format!("{:.4}", result.est_pos[i].y),
            format!("{:.4}", result.est_pos[i].z),
            format!("{:.4}", result.truth_vel[i].x),
            format!("{:.4}", result.truth_vel[i].y),
            format!("{:.4}", result.truth_vel[i].z),
            format!("{:.4}", result.est_vel[i].x),
            format!("{:.4}", result.est_vel[i].y),
            format!("{:.4}", result.est_vel[i].z),
            format!("{:.4}", result.truth_yaw[i]),
            format!("{:.4}", result.est_yaw[i]),
            format!("{:.4}", result.eph[i]),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
