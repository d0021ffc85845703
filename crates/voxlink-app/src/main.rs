//! Headless peer entry point (native).

#[cfg(feature = "native")]
fn main() {
    use voxlink_app::auth::authorizer_for;
    use voxlink_app::peer::{CONFIG_ENV, Peer, config_path};
    use voxlink_core::config::SessionConfig;
    use voxlink_core::shortcuts::ShortcutRegistry;

    env_logger::init();
    log::info!("Starting VoxLink peer");
    log::info!("Shortcuts:");
    ShortcutRegistry::log_all();

    let path = config_path(std::env::args().nth(1), std::env::var(CONFIG_ENV).ok());
    let config = match SessionConfig::load_or_default(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(path) = &path {
        log::info!("Config: {}", path.display());
    }

    let mut peer = Peer::new(&config);
    if let Err(e) = peer.connect(authorizer_for(&config)) {
        log::error!("Failed to connect: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = peer.run() {
        log::error!("Peer stopped: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "native"))]
fn main() {
    panic!("Native feature not enabled. Use `cargo run --features native`");
}
