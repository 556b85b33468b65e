use std::path::PathBuf;

fn main() -> std::io::Result<()> {
    println!("cargo:rerun-if-env-changed=LND_REPO_DIR");
    let dir = match std::env::var_os("LND_REPO_DIR") {
        Some(lnd_repo_path) => {
            let mut lnd_rpc_dir = PathBuf::from(lnd_repo_path);
            lnd_rpc_dir.push("lnrpc");
            lnd_rpc_dir
        },
        None => PathBuf::from("vendor"),
    };

    // Only the informational services used to probe a session are compiled. Server stubs are
    // generated too so tests can stand up a node.
    let protos = [
        "lightning.proto",
        "verrpc/verrpc.proto",
    ];

    let proto_paths: Vec<_> = protos
        .iter()
        .map(|proto| dir.join(proto))
        .collect();

    for path in &proto_paths {
        println!("cargo:rerun-if-changed={}", path.display());
    }

    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile(&proto_paths, &[dir])?;
    Ok(())
}
