use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("logicrpc {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: logicrpc");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("LOGICRPC_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: client={}, schema={}, cli=true",
        cfg!(feature = "client"),
        cfg!(feature = "schema")
    );
    println!("default_socket: {}", logicrpc_transport::DEFAULT_SOCKET_PATH);
    println!(
        "max_payload_bytes: {}",
        logicrpc_frame::DEFAULT_MAX_PAYLOAD
    );

    Ok(SUCCESS)
}
