//end-to-end scenarios: a real driver + coordinator + device manager running
//against a scripted in-memory stream that speaks full zboss frames

use std::collections::{ HashSet, VecDeque };
use std::path::PathBuf;
use std::sync::atomic::{ AtomicU32, Ordering };
use std::sync::{ Arc, Mutex };
use std::time::{ Duration, Instant };

use async_std::task;
use frames::{ FrameRead, FrameWrite };
use zigbee::registry::Registry;
use zigbee::value::Value;
use zigbee::{ aps, hl, ll, zcl, zdo };
use zighub::catalog::{ DeviceDb, DeviceDefinition, PropertyDef, PropertySpec, ReportingEntry };
use zighub::clusters;
use zighub::coordinator::{ self, Coordinator };
use zighub::events::{ Event, EventBus };
use zighub::ieee::Ieee;
use zighub::ncp::{ self, FrameStream, Ncp };
use zighub::store::{ Device, NetworkState, Store };

const DEV_IEEE: [u8; 8] = [0x00, 0x15, 0x8D, 0x00, 0x01, 0x2A, 0x3B, 0x4C];
const COORD_IEEE: [u8; 8] = [0xF4, 0xCE, 0x36, 0x00, 0x00, 0x00, 0x00, 0x01];
const DEV_SHORT: u16 = 0x1234;

//--- scripted ncp ---

struct MockState {
	rx: VecDeque<u8>,
	wr_buf: Vec<u8>,
	ncp_seq: u8,
	drop_acks: u32,
	retransmits: u32,
	silent: HashSet<u16>,
	requests: Vec<hl::HlPacket>,
	manufacturer: String,
	model: String,
	reset_ind_on_open: bool,
}

#[derive(Clone)]
struct MockNcp {
	state: Arc<Mutex<MockState>>,
}

struct MockStream {
	state: Arc<Mutex<MockState>>,
}

impl MockNcp {
	fn new() -> Self {
		Self {
			state: Arc::new(Mutex::new(MockState {
				rx: VecDeque::new(),
				wr_buf: Vec::new(),
				ncp_seq: 0,
				drop_acks: 0,
				retransmits: 0,
				silent: HashSet::new(),
				requests: Vec::new(),
				manufacturer: "LUMI".to_string(),
				model: "lumi.sensor_magnet.aq2".to_string(),
				reset_ind_on_open: false,
			})),
		}
	}

	fn stream(&self) -> MockStream {
		{
			let mut st = self.state.lock().unwrap();
			if st.reset_ind_on_open {
				//the stack announces itself after every boot
				let ind = hl::encode_indication(hl::CMD_NCP_RESET_IND, &[0x00]);
				push_data(&mut st, &ind);
			}
		}
		MockStream { state: self.state.clone() }
	}

	fn set_reset_ind_on_open(&self) {
		self.state.lock().unwrap().reset_ind_on_open = true;
	}

	fn set_drop_acks(&self, n: u32) {
		self.state.lock().unwrap().drop_acks = n;
	}

	fn set_silent(&self, call_id: u16) {
		self.state.lock().unwrap().silent.insert(call_id);
	}

	fn retransmits(&self) -> u32 {
		self.state.lock().unwrap().retransmits
	}

	fn request_calls(&self) -> Vec<u16> {
		self.state.lock().unwrap().requests.iter().map(|p| p.call_id).collect()
	}

	fn count_calls(&self, call_id: u16) -> usize {
		self.request_calls().iter().filter(|c| **c == call_id).count()
	}

	fn inject_indication(&self, call_id: u16, payload: &[u8]) {
		let mut st = self.state.lock().unwrap();
		let ind = hl::encode_indication(call_id, payload);
		push_data(&mut st, &ind);
	}
}

fn push_data(st: &mut MockState, hl_bytes: &[u8]) {
	st.ncp_seq = st.ncp_seq % 3 + 1;
	for b in ll::encode_data(st.ncp_seq, hl_bytes) {
		st.rx.push_back(b);
	}
}

fn push_raw(st: &mut MockState, bytes: Vec<u8>) {
	for b in bytes {
		st.rx.push_back(b);
	}
}

impl FrameRead for MockStream {
	fn read(&mut self, buf: &mut [u8]) -> Result<usize, frames::Error> {
		let mut st = self.state.lock().unwrap();
		if st.rx.is_empty() {
			return Err(frames::Error::WouldBlock);
		}
		let n = buf.len().min(st.rx.len());
		for slot in buf.iter_mut().take(n) {
			*slot = st.rx.pop_front().unwrap();
		}
		Ok(n)
	}
}

impl FrameWrite for MockStream {
	fn write(&mut self, buf: &[u8]) -> Result<usize, frames::Error> {
		let mut st = self.state.lock().unwrap();
		st.wr_buf.extend_from_slice(buf);
		process_writes(&mut st);
		Ok(buf.len())
	}

	fn flush(&mut self) -> Result<(), frames::Error> {
		Ok(())
	}
}

fn process_writes(st: &mut MockState) {
	loop {
		while !st.wr_buf.is_empty() && st.wr_buf[0] != ll::SIG0 {
			st.wr_buf.remove(0);
		}
		if st.wr_buf.len() < 4 {
			return;
		}
		let size = u16::from_le_bytes([st.wr_buf[2], st.wr_buf[3]]) as usize;
		let total = size + 2;
		if st.wr_buf.len() < total {
			return;
		}
		let frame_bytes: Vec<u8> = st.wr_buf.drain(..total).collect();
		let frame = match ll::decode(&frame_bytes) {
			Ok(f) => f,
			Err(_) => continue,
		};

		//the host acking our frames needs no reaction
		if frame.is_ack() {
			continue;
		}

		if ll::is_retransmit(frame.flags) {
			st.retransmits += 1;
		}

		//simulate a lost ack: the host never hears about this frame at all
		if st.drop_acks > 0 {
			st.drop_acks -= 1;
			continue;
		}

		push_raw(st, ll::encode_ack(frame.pkt_seq()));

		let packet = match hl::decode(&frame.body) {
			Ok(p) => p,
			Err(_) => continue,
		};
		if packet.packet_type != hl::PacketType::Request {
			continue;
		}
		st.requests.push(packet.clone());
		if st.silent.contains(&packet.call_id) {
			continue;
		}
		respond(st, &packet);
	}
}

fn respond(st: &mut MockState, req: &hl::HlPacket) {
	let payload: Vec<u8> = match req.call_id {
		//the ncp reboots on reset, nothing comes back
		hl::CMD_NCP_RESET => return,
		hl::CMD_GET_MODULE_VERSION => {
			let mut p = 0x01020304u32.to_le_bytes().to_vec();
			p.extend_from_slice(&0x030B0300u32.to_le_bytes());
			p.extend_from_slice(&0x00000001u32.to_le_bytes());
			p
		},
		hl::CMD_GET_LOCAL_IEEE => {
			let mut p = vec![0x00];
			p.extend_from_slice(&COORD_IEEE);
			p
		},
		//radio state as the stack sees it: page(1)+channel(1), pan LE, ext pan
		hl::CMD_GET_CHANNEL => vec![0x00, 15],
		hl::CMD_GET_PAN_ID => 0x1A62u16.to_le_bytes().to_vec(),
		hl::CMD_GET_EXT_PAN_ID => vec![0xDD, 0xCC, 0xBB, 0xAA, 0x00, 0x11, 0x22, 0x33],
		hl::CMD_ZDO_ACTIVE_EP_REQ => {
			let nwk = u16::from_le_bytes([req.payload[0], req.payload[1]]);
			zdo::ActiveEpRsp { count: 1, endpoints: vec![1], nwk_addr: nwk }.encode().unwrap()
		},
		hl::CMD_ZDO_SIMPLE_DESC_REQ => {
			let nwk = u16::from_le_bytes([req.payload[0], req.payload[1]]);
			zdo::SimpleDescRsp {
				endpoint: 1,
				profile_id: zcl::PROFILE_HA,
				device_id: 0x0402,
				device_version: 0,
				in_count: 3,
				out_count: 2,
				in_clusters: vec![0x0000, 0x0001, 0x0006],
				out_clusters: vec![0x0006, 0x0019],
				nwk_addr: nwk,
			}.encode().unwrap()
		},
		hl::CMD_APSDE_DATA_REQ => {
			maybe_zcl_read_response(st, req);
			Vec::new()
		},
		_ => Vec::new(),
	};
	push_data(st, &hl::encode_response(req.call_id, req.tsn, 0, 0, &payload));
}

//answer a zcl ReadAttributes on the basic cluster with manufacturer/model
fn maybe_zcl_read_response(st: &mut MockState, req: &hl::HlPacket) {
	let p = &req.payload;
	if p.len() < 25 {
		return;
	}
	let dst_short = u16::from_le_bytes([p[3], p[4]]);
	let cluster_id = u16::from_le_bytes([p[13], p[14]]);
	let dst_ep = p[15];
	let data = &p[24..];

	let Ok(header) = zcl::ZclHeader::parse(data) else { return; };
	if header.frame_type() != zcl::FRAME_TYPE_GLOBAL || header.command_id != zcl::CMD_READ_ATTRIBUTES {
		return;
	}
	if cluster_id != 0x0000 {
		return;
	}

	let mut records = Vec::new();
	let mut pos = header.header_len;
	while pos + 2 <= data.len() {
		let attr_id = u16::from_le_bytes([data[pos], data[pos + 1]]);
		pos += 2;
		let text = match attr_id {
			0x0004 => Some(st.manufacturer.clone()),
			0x0005 => Some(st.model.clone()),
			_ => None,
		};
		records.extend_from_slice(&attr_id.to_le_bytes());
		match text {
			Some(text) => {
				records.push(0x00);
				records.push(zcl::TYPE_STRING);
				records.push(text.len() as u8);
				records.extend_from_slice(text.as_bytes());
			},
			None => {
				records.push(0x86);	//UNSUPPORTED_ATTRIBUTE
			}
		}
	}

	let mut zf = vec![
		zcl::FRAME_TYPE_GLOBAL | zcl::DIR_SERVER_TO_CLIENT,
		header.sequence,
		zcl::CMD_READ_ATTRIBUTES_RSP,
	];
	zf.extend_from_slice(&records);

	let ind = aps::build_data_ind(dst_short, dst_ep, cluster_id, 200, -50, &zf);
	push_data(st, &hl::encode_indication(hl::CMD_APSDE_DATA_IND, &ind));
}

//--- fixture ---

static SEQ: AtomicU32 = AtomicU32::new(0);

fn temp_store() -> (Arc<Store>, PathBuf) {
	let path = std::env::temp_dir().join(format!(
		"zighub-scenario-{}-{}.json",
		std::process::id(),
		SEQ.fetch_add(1, Ordering::SeqCst)
	));
	let _ = std::fs::remove_file(&path);
	(Arc::new(Store::open(&path).unwrap()), path)
}

fn aqara_definition() -> DeviceDefinition {
	DeviceDefinition {
		manufacturer: "LUMI".to_string(),
		model: "lumi.sensor_magnet.aq2".to_string(),
		friendly_name: "Aqara Door Sensor".to_string(),
		bind: vec![0x0006],
		reporting: vec![ReportingEntry {
			cluster: 0x0001,
			attribute: 0x0021,
			type_id: zcl::TYPE_UINT8,
			min: 3600,
			max: 14400,
			change: 1,
		}],
		properties: vec![PropertySpec {
			cluster: 0x0000,
			attribute: 0xFF01,
			decoder: "xiaomi_tlv".to_string(),
			values: vec![
				PropertyDef { tag: 1, name: "battery_voltage".to_string(), transform: String::new() },
				PropertyDef { tag: 100, name: "contact".to_string(), transform: String::new() },
			],
		}],
	}
}

struct Fixture {
	mock: MockNcp,
	coord: Arc<Coordinator>,
	store: Arc<Store>,
	store_path: PathBuf,
	events: Arc<Mutex<Vec<Event>>>,
}

fn setup(mock: MockNcp, ncp: Arc<Ncp>, store: Arc<Store>, store_path: PathBuf) -> Fixture {
	let registry = Arc::new(Registry::new());
	for c in clusters::standard_clusters() {
		registry.register(c);
	}

	let mut db = DeviceDb::new();
	db.add(aqara_definition());

	let bus = Arc::new(EventBus::new());
	let events = Arc::new(Mutex::new(Vec::new()));
	let log = events.clone();
	bus.on_all(move |e| log.lock().unwrap().push(e.clone()));

	let coord = Coordinator::new(
		ncp,
		store.clone(),
		registry,
		Arc::new(db),
		bus,
		coordinator::Config { channel: 15, pan_id: 0x1A62, ext_pan_id: [0xDD, 0xCC, 0xBB, 0xAA, 0x00, 0x11, 0x22, 0x33] },
		coordinator::NcpPortConfig { port: "mock".to_string(), baud: 460_800 },
		100,	//short retry jitter keeps failing tests fast
	);

	Fixture { mock, coord, store, store_path, events }
}

fn fixture() -> Fixture {
	let mock = MockNcp::new();
	let ncp = Arc::new(Ncp::with_stream(mock.stream()));
	let (store, store_path) = temp_store();
	setup(mock, ncp, store, store_path)
}

impl Fixture {
	fn cleanup(&self) {
		let _ = std::fs::remove_file(&self.store_path);
	}

	fn event_kinds(&self) -> Vec<&'static str> {
		self.events.lock().unwrap().iter().map(|e| e.kind().as_str()).collect()
	}

	async fn join_and_announce(&self) {
		let upd = zdo::DevUpdateInd { ieee: DEV_IEEE, nwk_addr: DEV_SHORT, status: zdo::DEV_UPDATE_SECURE_REJOIN };
		self.mock.inject_indication(hl::CMD_ZDO_DEV_UPDATE_IND, &upd.encode().unwrap());
		task::sleep(Duration::from_millis(50)).await;

		let annce = zdo::DevAnnceInd { nwk_addr: DEV_SHORT, ieee: DEV_IEEE, capability: 0x80 };
		self.mock.inject_indication(hl::CMD_ZDO_DEV_ANNCE_IND, &annce.encode().unwrap());
	}

	async fn wait_interviewed(&self, ieee: Ieee) -> Device {
		wait_until(Duration::from_secs(5), || {
			self.store.get_device(ieee).map(|d| d.interviewed).unwrap_or(false)
		}).await;
		self.store.get_device(ieee).expect("device record")
	}
}

async fn wait_until<F: Fn() -> bool>(timeout: Duration, cond: F) {
	let deadline = Instant::now() + timeout;
	while Instant::now() < deadline {
		if cond() {
			return;
		}
		task::sleep(Duration::from_millis(10)).await;
	}
	panic!("condition not met within {:?}", timeout);
}

fn dev_ieee() -> Ieee {
	Ieee::from_wire(DEV_IEEE)
}

//--- scenarios ---

#[async_std::test]
async fn join_and_interview() {
	let f = fixture();

	f.join_and_announce().await;
	let dev = f.wait_interviewed(dev_ieee()).await;

	assert_eq!(dev.short_address, DEV_SHORT);
	assert_eq!(dev.manufacturer, "LUMI");
	assert_eq!(dev.model, "lumi.sensor_magnet.aq2");
	assert_eq!(dev.friendly_name, "Aqara Door Sensor");
	assert_eq!(dev.endpoints.len(), 1);
	assert!(dev.endpoints[0].has_in_cluster(0x0006));
	assert!(dev.endpoints[0].has_out_cluster(0x0019));

	//the device definition drove one bind and one reporting configuration
	assert_eq!(f.mock.count_calls(hl::CMD_ZDO_BIND_REQ), 1);
	assert_eq!(f.mock.count_calls(hl::CMD_ZDO_ACTIVE_EP_REQ), 1);

	let kinds = f.event_kinds();
	assert_eq!(kinds.iter().filter(|k| **k == "device_joined").count(), 1);
	assert_eq!(kinds.iter().filter(|k| **k == "device_announce").count(), 1);

	f.coord.stop().await;
	f.cleanup();
}

#[async_std::test]
async fn attribute_report_becomes_property_update() {
	let f = fixture();
	f.join_and_announce().await;
	f.wait_interviewed(dev_ieee()).await;
	f.events.lock().unwrap().clear();

	//Report Attributes: cluster 0x0006 attr 0x0000 bool true
	let zf = vec![
		zcl::FRAME_TYPE_GLOBAL | zcl::DIR_SERVER_TO_CLIENT,
		0x21,
		zcl::CMD_REPORT_ATTRIBUTES,
		0x00, 0x00, zcl::TYPE_BOOL, 0x01,
	];
	let ind = aps::build_data_ind(DEV_SHORT, 1, 0x0006, 180, -55, &zf);
	f.mock.inject_indication(hl::CMD_APSDE_DATA_IND, &ind);

	wait_until(Duration::from_secs(3), || {
		f.store.get_device(dev_ieee())
			.map(|d| d.properties.get("on_off") == Some(&Value::Bool(true)))
			.unwrap_or(false)
	}).await;

	let events = f.events.lock().unwrap().clone();
	let report = events.iter().find_map(|e| match e {
		Event::AttributeReport { cluster_id, attr_id, value, .. } => Some((*cluster_id, *attr_id, value.clone())),
		_ => None,
	}).expect("attribute_report event");
	assert_eq!(report, (0x0006, 0x0000, Some(Value::Bool(true))));

	let prop = events.iter().find_map(|e| match e {
		Event::PropertyUpdate { property, value, .. } => Some((property.clone(), value.clone())),
		_ => None,
	}).expect("property_update event");
	assert_eq!(prop, ("on_off".to_string(), Value::Bool(true)));

	let dev = f.store.get_device(dev_ieee()).unwrap();
	assert_eq!(dev.lqi, 180);
	assert_eq!(dev.rssi, -55);

	f.coord.stop().await;
	f.cleanup();
}

#[async_std::test]
async fn xiaomi_tlv_property_extraction() {
	let f = fixture();
	f.join_and_announce().await;
	f.wait_interviewed(dev_ieee()).await;
	f.events.lock().unwrap().clear();

	let tlv: [u8; 25] = [
		0x01, 0x21, 0xEF, 0x0B,
		0x03, 0x28, 0x1F,
		0x04, 0x21, 0x2D, 0x5A,
		0x05, 0x21, 0x02, 0x00,
		0x06, 0x24, 0x02, 0x00, 0x00, 0x00, 0x00,
		0x64, 0x10, 0x01,
	];

	//vendor report: cluster 0x0000 attr 0xFF01 octstr carrying the tlv
	let mut zf = vec![
		zcl::FRAME_TYPE_GLOBAL | zcl::DIR_SERVER_TO_CLIENT,
		0x33,
		zcl::CMD_REPORT_ATTRIBUTES,
		0x01, 0xFF, zcl::TYPE_OCTSTR, tlv.len() as u8,
	];
	zf.extend_from_slice(&tlv);
	let ind = aps::build_data_ind(DEV_SHORT, 1, 0x0000, 200, -40, &zf);
	f.mock.inject_indication(hl::CMD_APSDE_DATA_IND, &ind);

	wait_until(Duration::from_secs(3), || {
		f.store.get_device(dev_ieee())
			.map(|d| d.properties.contains_key("battery_voltage") && d.properties.contains_key("contact"))
			.unwrap_or(false)
	}).await;

	let dev = f.store.get_device(dev_ieee()).unwrap();
	assert_eq!(dev.properties["battery_voltage"], Value::Uint(3055));
	assert_eq!(dev.properties["contact"], Value::Bool(true));

	//both updates fired, in catalog order, each carrying its source
	let updates: Vec<(String, Value, Option<u8>)> = f.events.lock().unwrap().iter().filter_map(|e| match e {
		Event::PropertyUpdate { property, value, source, .. } =>
			Some((property.clone(), value.clone(), source.as_ref().map(|s| s.tag))),
		_ => None,
	}).collect();
	assert_eq!(updates.len(), 2);
	assert_eq!(updates[0], ("battery_voltage".to_string(), Value::Uint(3055), Some(1)));
	assert_eq!(updates[1], ("contact".to_string(), Value::Bool(true), Some(100)));

	f.coord.stop().await;
	f.cleanup();
}

#[async_std::test]
async fn network_resume_vs_form_decision() {
	//matching persisted state: start resumes without forming
	{
		let mock = MockNcp::new();
		mock.set_reset_ind_on_open();
		let opener_mock = mock.clone();
		let ncp = Arc::new(Ncp::with_opener(Box::new(move || {
			Ok(Box::new(opener_mock.stream()) as Box<dyn FrameStream>)
		})).unwrap());

		let (store, store_path) = temp_store();
		store.save_network_state(&NetworkState {
			channel: 15,
			pan_id: 0x1A62,
			ext_pan_id: "DDCCBBAA00112233".to_string(),
			network_key: None,
			formed: true,
		}).unwrap();

		let f = setup(mock, ncp, store, store_path);
		f.coord.start().await.expect("resume start");

		let calls = f.mock.request_calls();
		assert!(calls.contains(&hl::CMD_NWK_START_WITHOUT_FORM));
		assert!(!calls.contains(&hl::CMD_NWK_FORMATION), "resume must not re-form");
		assert!(f.event_kinds().contains(&"network_state"));

		//the status summary reports the radio state read back from the ncp
		let summary = f.coord.network_info().await.expect("network info");
		assert_eq!(summary["channel"], 15);
		assert_eq!(summary["pan_id"], "0x1A62");
		assert_eq!(summary["ext_pan_id"], "DDCCBBAA00112233");
		assert_eq!(summary["coordinator_ieee"], Ieee::from_wire(COORD_IEEE).to_string());

		f.coord.stop().await;
		f.cleanup();
	}

	//channel mismatch: start forms a fresh network
	{
		let mock = MockNcp::new();
		mock.set_reset_ind_on_open();
		let opener_mock = mock.clone();
		let ncp = Arc::new(Ncp::with_opener(Box::new(move || {
			Ok(Box::new(opener_mock.stream()) as Box<dyn FrameStream>)
		})).unwrap());

		let (store, store_path) = temp_store();
		store.save_network_state(&NetworkState {
			channel: 16,	//configured channel is 15
			pan_id: 0x1A62,
			ext_pan_id: "DDCCBBAA00112233".to_string(),
			network_key: None,
			formed: true,
		}).unwrap();

		let f = setup(mock, ncp, store, store_path);
		f.coord.start().await.expect("form start");

		let calls = f.mock.request_calls();
		assert!(calls.contains(&hl::CMD_NWK_FORMATION));
		assert!(calls.contains(&hl::CMD_SET_NWK_KEY));
		assert!(calls.contains(&hl::CMD_NWK_START_WITHOUT_FORM));

		//formation persisted the refreshed state, key included
		let state = f.store.get_network_state().unwrap();
		assert_eq!(state.channel, 15);
		assert!(state.formed);
		assert!(state.network_key.is_some());

		f.coord.stop().await;
		f.cleanup();
	}
}

#[async_std::test]
async fn ll_retransmit_recovers_from_lost_ack() {
	let mock = MockNcp::new();
	let ncp = Ncp::with_stream(mock.stream());

	mock.set_drop_acks(1);

	let resp = ncp.request(hl::CMD_GET_MODULE_VERSION, Vec::new(), Duration::from_secs(5)).await
		.expect("request should survive one lost ack");
	assert!(resp.status_ok());
	assert_eq!(mock.retransmits(), 1);

	ncp.close();
}

#[async_std::test]
async fn ncp_reset_fails_pending_request() {
	let mock = MockNcp::new();
	let ncp = Arc::new(Ncp::with_stream(mock.stream()));

	//request gets acked but never answered
	mock.set_silent(hl::CMD_GET_MODULE_VERSION);

	let pending = {
		let ncp = ncp.clone();
		task::spawn(async move {
			ncp.request(hl::CMD_GET_MODULE_VERSION, Vec::new(), Duration::from_secs(30)).await
		})
	};

	task::sleep(Duration::from_millis(200)).await;
	let started = Instant::now();
	mock.inject_indication(hl::CMD_NCP_RESET_IND, &[0x00]);

	let result = pending.await;
	assert!(started.elapsed() < Duration::from_secs(5), "must not wait out the timeout");
	assert!(matches!(result, Err(ncp::Error::Reset)), "got {:?}", result);

	ncp.close();
}

#[async_std::test]
async fn leave_during_interview_cancels_and_deletes() {
	let f = fixture();

	//the device never answers the endpoint query, so the interview hangs in
	//its first step until cancelled
	f.mock.set_silent(hl::CMD_ZDO_ACTIVE_EP_REQ);

	f.join_and_announce().await;
	task::sleep(Duration::from_millis(300)).await;
	assert!(f.coord.devices().interviewing(dev_ieee()));

	let upd = zdo::DevUpdateInd { ieee: DEV_IEEE, nwk_addr: DEV_SHORT, status: zdo::DEV_UPDATE_LEFT };
	f.mock.inject_indication(hl::CMD_ZDO_DEV_UPDATE_IND, &upd.encode().unwrap());

	wait_until(Duration::from_secs(3), || !f.coord.devices().interviewing(dev_ieee())).await;
	wait_until(Duration::from_secs(3), || f.store.get_device(dev_ieee()).is_err()).await;

	let kinds = f.event_kinds();
	assert!(kinds.contains(&"device_left"));

	f.coord.stop().await;
	f.cleanup();
}

#[async_std::test]
async fn duplicate_announce_starts_single_interview() {
	let f = fixture();

	f.join_and_announce().await;
	task::sleep(Duration::from_millis(100)).await;

	//second announce lands inside the debounce window
	let annce = zdo::DevAnnceInd { nwk_addr: DEV_SHORT, ieee: DEV_IEEE, capability: 0x80 };
	f.mock.inject_indication(hl::CMD_ZDO_DEV_ANNCE_IND, &annce.encode().unwrap());

	f.wait_interviewed(dev_ieee()).await;
	task::sleep(Duration::from_millis(200)).await;

	assert_eq!(f.mock.count_calls(hl::CMD_ZDO_ACTIVE_EP_REQ), 1, "second interview must be debounced");

	f.coord.stop().await;
	f.cleanup();
}

#[async_std::test]
async fn addr_index_rebuilds_from_store() {
	let f = fixture();

	let a: Ieee = "AAAAAAAAAAAAAAAA".parse().unwrap();
	let b: Ieee = "BBBBBBBBBBBBBBBB".parse().unwrap();
	f.store.save_device(&Device::new(a, 0x0001)).unwrap();
	f.store.save_device(&Device::new(b, 0x0002)).unwrap();

	let dm = f.coord.devices();
	assert_eq!(dm.lookup_ieee(0x0003), None);
	assert_eq!(dm.lookup_or_rebuild(0x0001), Some(a));
	assert_eq!(dm.lookup_or_rebuild(0x0002), Some(b));
	assert_eq!(dm.lookup_or_rebuild(0x0003), None);

	f.coord.stop().await;
	f.cleanup();
}

#[async_std::test]
async fn tuya_cluster_command_properties() {
	//catalog with a tuya data point definition instead of the aqara one
	let registry = Arc::new(Registry::new());
	for c in clusters::standard_clusters() {
		registry.register(c);
	}
	let mut db = DeviceDb::new();
	db.add(DeviceDefinition {
		manufacturer: "LUMI".to_string(),
		model: "lumi.sensor_magnet.aq2".to_string(),
		friendly_name: String::new(),
		bind: vec![],
		reporting: vec![],
		properties: vec![PropertySpec {
			cluster: 0xEF00,
			attribute: 0,
			decoder: "tuya_dp".to_string(),
			values: vec![PropertyDef { tag: 1, name: "switch".to_string(), transform: String::new() }],
		}],
	});

	let bus = Arc::new(EventBus::new());
	let events = Arc::new(Mutex::new(Vec::new()));
	let log = events.clone();
	bus.on_all(move |e| log.lock().unwrap().push(e.clone()));

	let mock = MockNcp::new();
	let ncp = Arc::new(Ncp::with_stream(mock.stream()));
	let (store, store_path) = temp_store();
	let coord = Coordinator::new(
		ncp,
		store.clone(),
		registry,
		Arc::new(db),
		bus,
		coordinator::Config { channel: 15, pan_id: 0x1A62, ext_pan_id: [0; 8] },
		coordinator::NcpPortConfig { port: "mock".to_string(), baud: 460_800 },
		100,
	);

	//seed an interviewed device so the lookup path works without a join
	let mut dev = Device::new(dev_ieee(), DEV_SHORT);
	dev.manufacturer = "LUMI".to_string();
	dev.model = "lumi.sensor_magnet.aq2".to_string();
	dev.interviewed = true;
	store.save_device(&dev).unwrap();

	//tuya TY_DATA_REPORT (cmd 0x02): seq(2) + dp 1, bool, len 1, value 1
	let dp_payload = [0x00, 0x07, 0x01, 0x01, 0x00, 0x01, 0x01];
	let zf = zcl::build_cluster_command(0x44, 0x02, &dp_payload);
	let ind = aps::build_data_ind(DEV_SHORT, 1, 0xEF00, 150, -62, &zf);
	mock.inject_indication(hl::CMD_APSDE_DATA_IND, &ind);

	wait_until(Duration::from_secs(3), || {
		store.get_device(dev_ieee())
			.map(|d| d.properties.get("switch") == Some(&Value::Bool(true)))
			.unwrap_or(false)
	}).await;

	let got_cmd = events.lock().unwrap().iter().any(|e| matches!(e, Event::ClusterCommand { cluster_id: 0xEF00, command_id: 0x02, .. }));
	assert!(got_cmd, "cluster_command event expected");

	coord.stop().await;
	let _ = std::fs::remove_file(store_path);
}
