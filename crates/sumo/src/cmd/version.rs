use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("sumo {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: sumo");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("SUMO_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("SUMO_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("SUMO_GIT_HASH").unwrap_or("unknown"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("default_device: {}", sumo_session::DEFAULT_DEVICE_ADDR);
    println!(
        "default_ports: control={}, data={}",
        sumo_session::DEFAULT_CONTROL_PORT,
        sumo_session::DEFAULT_DATA_PORT
    );
    println!("player: {}", sumo_session::DEFAULT_PLAYER);

    Ok(SUCCESS)
}
