use std::env::args;
use std::sync::Arc;
use tracing::{ error, info };
use tracing_subscriber::EnvFilter;

use zigbee::registry::Registry;
use zighub::catalog;
use zighub::clusters;
use zighub::config::{ Config, LogConfig };
use zighub::coordinator::{ self, Coordinator };
use zighub::events::EventBus;
use zighub::ncp::Ncp;
use zighub::store::Store;

fn init_tracing(log: &LogConfig) {
	let filter = EnvFilter::try_new(&log.level).unwrap_or_else(|_| EnvFilter::new("info"));
	match log.format.as_str() {
		"json" => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
		_ => tracing_subscriber::fmt().with_env_filter(filter).init(),
	}
}

#[async_std::main]
async fn main() {
	let cfg_path = match args().nth(1) {
		None => "./config.json".to_string(),
		Some(s) => s,
	};

	let cfg = match Config::load(&cfg_path) {
		Ok(c) => c,
		Err(e) => {
			eprintln!("load config {}: {}", cfg_path, e);
			std::process::exit(1);
		}
	};

	init_tracing(&cfg.log);
	info!(version = env!("CARGO_PKG_VERSION"), "zighub starting");

	let registry = Arc::new(Registry::new());
	for c in clusters::standard_clusters() {
		registry.register(c);
	}

	let device_db = match catalog::load_device_dir(&cfg.devices_dir, &registry) {
		Ok(db) => Arc::new(db),
		Err(e) => {
			error!(err = %e, "load device definitions");
			std::process::exit(1);
		}
	};
	info!(clusters = registry.len(), devices = device_db.len(), "zcl registry initialized");

	let store = match Store::open(&cfg.store.path) {
		Ok(s) => Arc::new(s),
		Err(e) => {
			error!(err = %e, path = %cfg.store.path, "open store");
			std::process::exit(1);
		}
	};

	let ncp = match Ncp::open(&cfg.ncp.port, cfg.ncp.baud) {
		Ok(n) => Arc::new(n),
		Err(e) => {
			error!(err = %e, port = %cfg.ncp.port, "open ncp");
			std::process::exit(1);
		}
	};
	info!(port = %cfg.ncp.port, baud = cfg.ncp.baud, "using nRF52840 ncp (zboss)");

	//validated at load, parse cannot fail here
	let ext_pan_id = cfg.ext_pan_id().unwrap_or_default();

	let events = Arc::new(EventBus::new());
	let coord = Coordinator::new(
		ncp,
		store,
		registry,
		device_db,
		events,
		coordinator::Config {
			channel: cfg.network.channel,
			pan_id: cfg.network.pan_id,
			ext_pan_id,
		},
		coordinator::NcpPortConfig {
			port: cfg.ncp.port.clone(),
			baud: cfg.ncp.baud,
		},
		cfg.interview.retry_jitter_ms,
	);

	if let Err(e) = coord.start().await {
		error!(err = %e, "start coordinator");
		coord.stop().await;
		std::process::exit(1);
	}

	//external sinks (http ui, mqtt bridge, scripting) attach to the event
	//bus from here on; the daemon itself just keeps the network running
	futures::future::pending::<()>().await;
}
