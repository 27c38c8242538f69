//typed ncp operations on top of the protocol loop: lifecycle, network
//management, zdo, apsde and the zcl conveniences

use std::sync::{ Arc, Mutex };
use std::sync::atomic::{ AtomicU8, Ordering };
use std::time::Duration;
use async_std::channel::{ Receiver, Sender };
use async_std::future;
use async_std::task;
use rand::Rng;
use tracing::{ debug, info, warn };
use zigbee::{ aps, hl, zcl, zdo };
use super::processor::{ self, Msg, NcpFuture, RequestState, ZclReadFuture, ZclReadState };
use super::{
	BindRequest, ClusterCommandRequest, ConfigureReportingRequest, Error, FrameStream,
	NcpHandler, NcpInfo, NetworkConfig, NetworkInfo, NetworkScanResult,
	ReadAttributesRequest, ResetOption, SimpleDescriptor, WriteAttributesRequest,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const SCAN_TIMEOUT: Duration = Duration::from_secs(15);
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const RESET_IND_TIMEOUT: Duration = Duration::from_secs(3);
const REOPEN_ATTEMPTS: u32 = 30;

type Opener = Box<dyn Fn() -> Result<Box<dyn FrameStream>, frames::Error> + Send + Sync>;

struct Link {
	tx: Sender<Msg>,
	reset_ind: Receiver<()>,
}

///Driver for the nRF52840 ZBOSS NCP. Owns the serial link through the
///protocol loop; all methods are callable from any task.
pub struct Ncp {
	link: Mutex<Link>,
	opener: Option<Opener>,
	info: Mutex<NcpInfo>,
	zcl_seq: AtomicU8,
	handler: Mutex<Option<Arc<dyn NcpHandler>>>,
}

impl Ncp {
	///Open the CDC-ACM port and start the protocol loop.
	pub fn open(port: &str, baud: u32) -> Result<Self, Error> {
		let port_name = port.to_string();
		let opener: Opener = Box::new(move || {
			let p = frames::open_port(&port_name, baud)?;
			Ok(Box::new(p) as Box<dyn FrameStream>)
		});
		Self::with_opener(opener)
	}

	///Start over streams produced by the opener; reset re-enumeration calls
	///it again for each reopen attempt.
	pub fn with_opener(opener: Opener) -> Result<Self, Error> {
		let stream = opener()?;
		let (tx, reset_ind) = processor::spawn(stream, None);
		Ok(Self {
			link: Mutex::new(Link { tx, reset_ind }),
			opener: Some(opener),
			info: Mutex::new(NcpInfo::default()),
			zcl_seq: AtomicU8::new(0),
			handler: Mutex::new(None),
		})
	}

	///Run over a single fixed stream; reset cannot reopen and reports
	///failure after sending the reset command.
	pub fn with_stream<FS: FrameStream + 'static>(stream: FS) -> Self {
		let (tx, reset_ind) = processor::spawn(stream, None);
		Self {
			link: Mutex::new(Link { tx, reset_ind }),
			opener: None,
			info: Mutex::new(NcpInfo::default()),
			zcl_seq: AtomicU8::new(0),
			handler: Mutex::new(None),
		}
	}

	///Register indication callbacks; survives resets.
	pub fn set_handler(&self, handler: Arc<dyn NcpHandler>) {
		*self.handler.lock().unwrap() = Some(handler.clone());
		let tx = self.link.lock().unwrap().tx.clone();
		let _ = tx.try_send(Msg::SetHandler(handler));
	}

	pub fn ncp_info(&self) -> NcpInfo {
		self.info.lock().unwrap().clone()
	}

	///Low-level request; most callers want call() which also checks status.
	pub fn request(&self, call_id: u16, payload: Vec<u8>, timeout: Duration) -> NcpFuture {
		let state = Arc::new(Mutex::new(RequestState::new(call_id, payload, timeout)));
		let tx = self.link.lock().unwrap().tx.clone();
		let valid = tx.try_send(Msg::Request(state.clone())).is_ok();
		NcpFuture { state, valid }
	}

	async fn call(&self, call_id: u16, payload: Vec<u8>, timeout: Duration) -> Result<hl::HlPacket, Error> {
		let resp = self.request(call_id, payload, timeout).await?;
		if !resp.status_ok() {
			let call = hl::call_name(call_id);
			warn!(call = %call, status = %hl::status_name(resp.status_cat, resp.status_code), "ncp error status");
			return Err(Error::Status { call, category: resp.status_cat, code: resp.status_code });
		}
		Ok(resp)
	}

	pub fn close(&self) {
		let tx = self.link.lock().unwrap().tx.clone();
		let _ = tx.try_send(Msg::Close);
	}

	//--- lifecycle ---

	pub async fn reset(&self, option: ResetOption) -> Result<(), Error> {
		info!(option = option.name(), "resetting ncp");
		{
			let link = self.link.lock().unwrap();
			let _ = link.tx.try_send(Msg::Reset { option: option as u8 });
		}
		//let the ncp process the command before the port disappears
		task::sleep(Duration::from_millis(100)).await;

		let Some(opener) = self.opener.as_ref() else {
			return Err(Error::ReconnectFailed { what: option.name() });
		};

		//usb re-enumerates after reset, factory reset may cycle twice
		for attempt in 1..=REOPEN_ATTEMPTS {
			task::sleep(Duration::from_secs(1)).await;

			let stream = match opener() {
				Ok(s) => s,
				Err(e) => {
					debug!(attempt, err = %e, "waiting for ncp usb");
					continue;
				}
			};

			let handler = self.handler.lock().unwrap().clone();
			let (tx, reset_ind) = processor::spawn(stream, handler);
			{
				let mut link = self.link.lock().unwrap();
				*link = Link { tx, reset_ind };
			}

			//verify the ncp answers before declaring victory
			let mut probe = self.call(hl::CMD_GET_MODULE_VERSION, Vec::new(), PROBE_TIMEOUT).await;
			if matches!(probe, Err(Error::Reset)) {
				//the boot-time NCPResetInd can race the probe and void it
				probe = self.call(hl::CMD_GET_MODULE_VERSION, Vec::new(), PROBE_TIMEOUT).await;
			}
			match probe {
				Ok(_) => {
					info!(attempts = attempt, "ncp reconnected after {}", option.name());
					//without NCPResetInd the stack may not be fully up yet
					//and NwkFormation fails with NO_MATCH
					let reset_ind = self.link.lock().unwrap().reset_ind.clone();
					match future::timeout(RESET_IND_TIMEOUT, reset_ind.recv()).await {
						Ok(Ok(())) => info!("NCPResetInd confirmed, ncp ready"),
						_ => warn!("NCPResetInd not received, proceeding anyway"),
					}
					return Ok(());
				},
				Err(e) => {
					//probably mid reboot cycle
					debug!(attempt, err = %e, "ncp not ready yet");
					let link = self.link.lock().unwrap();
					let _ = link.tx.try_send(Msg::Close);
				}
			}
		}

		Err(Error::ReconnectFailed { what: option.name() })
	}

	pub async fn factory_reset(&self) -> Result<(), Error> {
		self.reset(ResetOption::Factory).await
	}

	///Read versions and set the trust center policies for legacy joins with
	///standard key exchange over the well-known link key.
	pub async fn init(&self) -> Result<(), Error> {
		let resp = self.call(hl::CMD_GET_MODULE_VERSION, Vec::new(), DEFAULT_TIMEOUT).await?;
		if resp.payload.len() >= 12 {
			let p = &resp.payload;
			let fw = u32::from_le_bytes([p[0], p[1], p[2], p[3]]);
			let stack = u32::from_le_bytes([p[4], p[5], p[6], p[7]]);
			let proto = u32::from_le_bytes([p[8], p[9], p[10], p[11]]);
			let stack_str = format!("{}.{}.{}.{}", (stack >> 24) & 0xFF, (stack >> 16) & 0xFF, (stack >> 8) & 0xFF, stack & 0xFF);
			info!(fw, stack = %stack_str, protocol = proto, "ncp module version");
			let mut ncp_info = self.info.lock().unwrap();
			ncp_info.fw_version = fw;
			ncp_info.stack_version = stack_str;
			ncp_info.protocol_version = proto;
		}

		let policies: [(u16, u8, &str); 6] = [
			(hl::TC_POLICY_LINK_KEYS_REQUIRED, 0, "TC link keys required=false"),
			(hl::TC_POLICY_IC_REQUIRED, 0, "IC required=false"),
			(hl::TC_POLICY_TC_REJOIN_ENABLED, 1, "TC rejoin enabled=true"),
			(hl::TC_POLICY_IGNORE_TC_REJOIN, 0, "ignore TC rejoin=false"),
			(hl::TC_POLICY_APS_INSECURE_JOIN, 0, "APS insecure join=false"),
			(hl::TC_POLICY_DISABLE_NWK_MGMT_CHAN_UPDATE, 0, "disable mgmt chan update=false"),
		];
		for (policy, value, name) in policies {
			if let Err(e) = self.set_tc_policy(policy, value).await {
				warn!(policy = name, err = %e, "set tc policy failed");
				return Err(e);
			}
		}

		Ok(())
	}

	async fn set_tc_policy(&self, policy_type: u16, value: u8) -> Result<(), Error> {
		let mut buf = policy_type.to_le_bytes().to_vec();
		buf.push(value);
		self.call(hl::CMD_SET_TC_POLICY, buf, DEFAULT_TIMEOUT).await?;
		Ok(())
	}

	//--- network management ---

	pub async fn form_network(&self, cfg: NetworkConfig) -> Result<(), Error> {
		//strict zigpy-zboss ordering; each step must succeed

		self.call(hl::CMD_SET_ZIGBEE_ROLE, vec![hl::ROLE_COORDINATOR], DEFAULT_TIMEOUT).await?;

		self.call(hl::CMD_SET_EXT_PAN_ID, cfg.ext_pan_id.to_vec(), DEFAULT_TIMEOUT).await?;

		//channel mask: page(1) + mask(4)
		let mut chan_buf = vec![0x00u8];
		chan_buf.extend_from_slice(&(1u32 << cfg.channel).to_le_bytes());
		self.call(hl::CMD_SET_CHANNEL_MASK, chan_buf, DEFAULT_TIMEOUT).await?;

		//fresh random network key, key sequence number 0
		let key: [u8; 16] = rand::thread_rng().gen();
		let mut key_buf = key.to_vec();
		key_buf.push(0x00);
		self.call(hl::CMD_SET_NWK_KEY, key_buf, DEFAULT_TIMEOUT).await?;
		self.info.lock().unwrap().network_key = Some(key);
		info!("network key set");

		//formation: channel_list(1+5) + scan_duration(1) + distributed flag(1)
		//+ distributed addr(2) + ext pan id(8)
		let mut form_buf = vec![0x01u8, 0x00];
		form_buf.extend_from_slice(&(1u32 << cfg.channel).to_le_bytes());
		form_buf.push(0x05);
		form_buf.push(0x00);
		form_buf.extend_from_slice(&0u16.to_le_bytes());
		form_buf.extend_from_slice(&cfg.ext_pan_id);

		//NwkFormation can fail transiently right after a factory reset while
		//the mac layer finishes initialization
		let mut form_err = None;
		for attempt in 1..=3 {
			match self.call(hl::CMD_NWK_FORMATION, form_buf.clone(), DEFAULT_TIMEOUT).await {
				Ok(_) => {
					form_err = None;
					break;
				},
				Err(e) => {
					warn!(attempt, err = %e, "NwkFormation failed, retrying");
					form_err = Some(e);
					task::sleep(Duration::from_secs(2)).await;
				}
			}
		}
		if let Some(e) = form_err {
			return Err(e);
		}

		//pan id only after formation, the ncp rejects it earlier
		self.call(hl::CMD_SET_PAN_ID, cfg.pan_id.to_le_bytes().to_vec(), DEFAULT_TIMEOUT).await?;

		self.call(hl::CMD_SET_RX_ON_WHEN_IDLE, vec![0x01], DEFAULT_TIMEOUT).await?;

		//end device timeout 256 minutes
		if let Err(e) = self.call(hl::CMD_SET_ED_TIMEOUT, vec![0x08], DEFAULT_TIMEOUT).await {
			warn!(err = %e, "set ED timeout");
		}
		if let Err(e) = self.call(hl::CMD_SET_MAX_CHILDREN, vec![100], DEFAULT_TIMEOUT).await {
			warn!(err = %e, "set max children");
		}

		//give the ncp a moment to persist everything to nvram
		task::sleep(Duration::from_secs(1)).await;

		Ok(())
	}

	pub async fn start_network(&self) -> Result<(), Error> {
		self.call(hl::CMD_NWK_START_WITHOUT_FORM, Vec::new(), DEFAULT_TIMEOUT).await?;

		//register endpoint 1, HA profile, no clusters
		let mut ep_buf = vec![0x01u8];
		ep_buf.extend_from_slice(&zcl::PROFILE_HA.to_le_bytes());
		ep_buf.extend_from_slice(&0x0005u16.to_le_bytes());
		ep_buf.push(0x00);
		ep_buf.push(0x00);
		ep_buf.push(0x00);
		self.call(hl::CMD_AF_SET_SIMPLE_DESC, ep_buf, DEFAULT_TIMEOUT).await?;

		Ok(())
	}

	pub async fn permit_join(&self, duration: u8) -> Result<(), Error> {
		let req = zdo::PermitJoinReq { dest_addr: 0x0000, duration, tc_significance: 0x01 };
		self.call(hl::CMD_ZDO_PERMIT_JOINING_REQ, req.encode()?, DEFAULT_TIMEOUT).await?;
		Ok(())
	}

	pub async fn mgmt_leave(&self, short_addr: u16, ieee: [u8; 8], timeout: Duration) -> Result<(), Error> {
		//flags 0: leave permanently, no rejoin
		let req = zdo::MgmtLeaveReq { nwk_addr: short_addr, ieee, flags: 0x00 };
		self.call(hl::CMD_ZDO_MGMT_LEAVE_REQ, req.encode()?, timeout).await?;
		Ok(())
	}

	pub async fn network_info(&self) -> Result<NetworkInfo, Error> {
		let mut info = NetworkInfo::default();
		let mut last_err = None;

		match self.call(hl::CMD_GET_CHANNEL, Vec::new(), DEFAULT_TIMEOUT).await {
			//response: channel_page(1) + channel(1)
			Ok(resp) if resp.payload.len() >= 2 => info.channel = resp.payload[1],
			Ok(_) => {},
			Err(e) => last_err = Some(e),
		}
		match self.call(hl::CMD_GET_PAN_ID, Vec::new(), DEFAULT_TIMEOUT).await {
			Ok(resp) if resp.payload.len() >= 2 => {
				info.pan_id = u16::from_le_bytes([resp.payload[0], resp.payload[1]]);
			},
			Ok(_) => {},
			Err(e) => last_err = Some(e),
		}
		match self.call(hl::CMD_GET_EXT_PAN_ID, Vec::new(), DEFAULT_TIMEOUT).await {
			Ok(resp) if resp.payload.len() >= 8 => {
				info.ext_pan_id.copy_from_slice(&resp.payload[..8]);
			},
			Ok(_) => {},
			Err(e) => last_err = Some(e),
		}

		if info.channel == 0 && info.pan_id == 0 {
			if let Some(e) = last_err {
				return Err(e);
			}
		}
		Ok(info)
	}

	///Active beacon scan over channels 11-26, roughly 8 seconds.
	pub async fn network_scan(&self) -> Result<Vec<NetworkScanResult>, Error> {
		//channel_list_len(1) + page(1) + mask(4) + scan_duration(1)
		let mut buf = vec![0x01u8, 0x00];
		buf.extend_from_slice(&0x07FF_F800u32.to_le_bytes());
		buf.push(0x05);

		let resp = match self.call(hl::CMD_NWK_DISCOVERY, buf, SCAN_TIMEOUT).await {
			Ok(resp) => resp,
			//MAC/NO_BEACON: scan completed, zero networks found
			Err(e) if e.is_benign_scan_result() => {
				info!(networks_found = 0, "network scan complete");
				return Ok(Vec::new());
			},
			Err(e) => return Err(e),
		};

		//network_count(1) + descriptors[count * 16]
		if resp.payload.is_empty() {
			return Ok(Vec::new());
		}
		let count = resp.payload[0] as usize;
		const DESC_SIZE: usize = 16;
		let mut results = Vec::with_capacity(count);
		for i in 0..count {
			let off = 1 + i * DESC_SIZE;
			if off + DESC_SIZE > resp.payload.len() {
				break;
			}
			let d = &resp.payload[off..off + DESC_SIZE];
			let flags = d[13];
			let mut ext_pan_id = [0u8; 8];
			ext_pan_id.copy_from_slice(&d[0..8]);
			results.push(NetworkScanResult {
				ext_pan_id,
				pan_id: u16::from_le_bytes([d[8], d[9]]),
				update_id: d[10],
				channel: d[12],
				stack_profile: (flags >> 4) & 0x0F,
				permit_join: flags & 0x01 != 0,
				router_capacity: flags & 0x02 != 0,
				end_device_capacity: flags & 0x04 != 0,
				lqi: d[14],
				rssi: d[15] as i8,
			});
		}

		info!(networks_found = results.len(), "network scan complete");
		Ok(results)
	}

	pub async fn get_local_ieee(&self) -> Result<[u8; 8], Error> {
		//request: mac_interface_num(1); response: mac_interface_num(1) + ieee(8)
		let resp = self.call(hl::CMD_GET_LOCAL_IEEE, vec![0x00], DEFAULT_TIMEOUT).await?;
		if resp.payload.len() < 9 {
			return Err(Error::BadResponse { call: hl::call_name(hl::CMD_GET_LOCAL_IEEE), what: "short payload" });
		}
		let mut ieee = [0u8; 8];
		ieee.copy_from_slice(&resp.payload[1..9]);
		Ok(ieee)
	}

	//--- zdo ---

	pub async fn active_endpoints(&self, short_addr: u16, timeout: Duration) -> Result<Vec<u8>, Error> {
		let req = zdo::ActiveEpReq { nwk_addr: short_addr };
		let resp = self.call(hl::CMD_ZDO_ACTIVE_EP_REQ, req.encode()?, timeout).await?;

		//payload: ep_count(1) + ep_list + nwk_addr(2); parse leniently, some
		//firmware drops the trailer
		if resp.payload.is_empty() {
			return Err(Error::BadResponse { call: hl::call_name(hl::CMD_ZDO_ACTIVE_EP_REQ), what: "empty payload" });
		}
		let count = resp.payload[0] as usize;
		if resp.payload.len() < 1 + count {
			return Err(Error::BadResponse { call: hl::call_name(hl::CMD_ZDO_ACTIVE_EP_REQ), what: "truncated endpoint list" });
		}
		let endpoints = resp.payload[1..1 + count].to_vec();
		info!(short = %format_args!("{:#06X}", short_addr), endpoints = ?endpoints, "active endpoints");
		Ok(endpoints)
	}

	pub async fn simple_descriptor(&self, short_addr: u16, endpoint: u8, timeout: Duration) -> Result<SimpleDescriptor, Error> {
		let req = zdo::SimpleDescReq { nwk_addr: short_addr, endpoint };
		let resp = self.call(hl::CMD_ZDO_SIMPLE_DESC_REQ, req.encode()?, timeout).await?;

		let rsp = zdo::SimpleDescRsp::parse(&resp.payload)?;
		info!(
			short = %format_args!("{:#06X}", short_addr),
			ep = rsp.endpoint,
			profile = %format_args!("{:#06X}", rsp.profile_id),
			device = %format_args!("{:#06X}", rsp.device_id),
			in_clusters = rsp.in_clusters.len(),
			out_clusters = rsp.out_clusters.len(),
			"simple descriptor"
		);
		Ok(SimpleDescriptor {
			endpoint: rsp.endpoint,
			profile_id: rsp.profile_id,
			device_id: rsp.device_id,
			in_clusters: rsp.in_clusters,
			out_clusters: rsp.out_clusters,
		})
	}

	pub async fn bind(&self, req: BindRequest, timeout: Duration) -> Result<(), Error> {
		let payload = zdo::BindReq::new(req.target_short_addr, req.src_ieee, req.src_ep, req.cluster_id, req.dst_ieee, req.dst_ep);
		self.call(hl::CMD_ZDO_BIND_REQ, payload.encode()?, timeout).await?;
		Ok(())
	}

	pub async fn unbind(&self, req: BindRequest, timeout: Duration) -> Result<(), Error> {
		let payload = zdo::BindReq::new(req.target_short_addr, req.src_ieee, req.src_ep, req.cluster_id, req.dst_ieee, req.dst_ep);
		self.call(hl::CMD_ZDO_UNBIND_REQ, payload.encode()?, timeout).await?;
		Ok(())
	}

	//--- zcl over apsde ---

	fn next_zcl_seq(&self) -> u8 {
		self.zcl_seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
	}

	async fn send_apsde(&self, dst_addr: u16, dst_ep: u8, cluster_id: u16, zcl_frame: &[u8], timeout: Duration) -> Result<(), Error> {
		let payload = aps::build_data_req(dst_addr, dst_ep, 1, cluster_id, zcl::PROFILE_HA, 30, zcl_frame);
		self.call(hl::CMD_APSDE_DATA_REQ, payload, timeout).await?;
		Ok(())
	}

	///Send Read Attributes and await the matching response frame.
	pub async fn read_attributes(&self, req: ReadAttributesRequest, timeout: Duration) -> Result<Vec<zcl::ReadAttributeRecord>, Error> {
		info!(
			short = %format_args!("{:#06X}", req.dst_addr),
			ep = req.dst_ep,
			cluster = %format_args!("{:#06X}", req.cluster_id),
			attrs = ?req.attr_ids,
			"zcl read attributes"
		);

		let seq = self.next_zcl_seq();
		let frame = zcl::build_read_attributes(seq, &req.attr_ids);

		//register the waiter before the request leaves so a fast response
		//cannot slip past it
		let state = Arc::new(Mutex::new(ZclReadState::new(seq, timeout)));
		let tx = self.link.lock().unwrap().tx.clone();
		let valid = tx.try_send(Msg::ZclWait(state.clone())).is_ok();
		let wait = ZclReadFuture { state, valid };

		//this only confirms transmission, not the zcl answer
		self.send_apsde(req.dst_addr, req.dst_ep, req.cluster_id, &frame, timeout).await?;

		let records = wait.await?;
		Ok(zcl::parse_read_attribute_responses(&records))
	}

	pub async fn write_attributes(&self, req: WriteAttributesRequest, timeout: Duration) -> Result<(), Error> {
		let frame = zcl::build_write_attributes(self.next_zcl_seq(), &req.records);
		self.send_apsde(req.dst_addr, req.dst_ep, req.cluster_id, &frame, timeout).await
	}

	pub async fn send_command(&self, req: ClusterCommandRequest, timeout: Duration) -> Result<(), Error> {
		let frame = zcl::build_cluster_command(self.next_zcl_seq(), req.command_id, &req.payload);
		self.send_apsde(req.dst_addr, req.dst_ep, req.cluster_id, &frame, timeout).await
	}

	pub async fn configure_reporting(&self, req: ConfigureReportingRequest, timeout: Duration) -> Result<(), Error> {
		let frame = zcl::build_configure_reporting(
			self.next_zcl_seq(),
			req.attr_id,
			req.data_type,
			req.min_interval,
			req.max_interval,
			&req.report_change,
		);
		self.send_apsde(req.dst_addr, req.dst_ep, req.cluster_id, &frame, timeout).await
	}
}
