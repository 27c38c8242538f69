//single-owner protocol loop: owns the stream, the ll sequence/ack state, the
//outbound queue and both pending tables; commands arrive over a channel as
//shared future states that the loop completes and wakes

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{ Arc, Mutex };
use std::task::{ Context, Poll, Waker };
use std::time::{ Duration, Instant };
use async_std::channel::{ self, Receiver, Sender, TryRecvError };
use async_std::task;
use frames::{ Frame, FrameBuffer };
use tracing::{ debug, info, warn };
use zigbee::{ aps, hl, ll, zcl, zdo };
use super::{
	AttributeReportEvent, ClusterCommandEvent, DeviceAnnounceEvent, DeviceJoinedEvent,
	DeviceLeftEvent, Error, FrameStream, NcpHandler,
};

pub(crate) const ACK_TIMEOUT: Duration = Duration::from_millis(500);
pub(crate) const MAX_RETRIES: u8 = 3;
const TICK: Duration = Duration::from_millis(1);
const MAX_READS_PER_TICK: usize = 32;
const READ_BACKOFF_MIN: Duration = Duration::from_millis(10);
const READ_BACKOFF_MAX: Duration = Duration::from_secs(5);

pub(crate) struct RequestState {
	pub call_id: u16,
	pub payload: Vec<u8>,
	pub tsn: Option<u8>,
	pub response: Option<Result<hl::HlPacket, Error>>,
	pub waker: Option<Waker>,
	pub timeout: Duration,
	pub start: Instant,
}

impl RequestState {
	pub fn new(call_id: u16, payload: Vec<u8>, timeout: Duration) -> Self {
		Self {
			call_id,
			payload,
			tsn: None,
			response: None,
			waker: None,
			timeout,
			start: Instant::now(),
		}
	}

	fn complete(&mut self, result: Result<hl::HlPacket, Error>) {
		if self.response.is_none() {
			self.response = Some(result);
		}
		if let Some(waker) = self.waker.take() {
			waker.wake();
		}
	}
}

///Custom future resolved by the protocol loop when the matching HL response
///arrives, the deadline passes, or the NCP resets.
pub struct NcpFuture {
	pub(crate) state: Arc<Mutex<RequestState>>,
	pub(crate) valid: bool,
}

impl Future for NcpFuture {
	type Output = Result<hl::HlPacket, Error>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		if self.valid {
			let mut state = self.state.lock().unwrap();

			if let Some(response) = state.response.take() {
				return Poll::Ready(response);
			}
			state.waker = Some(cx.waker().clone());
			return Poll::Pending;
		}

		//the loop is gone, nothing will ever complete this
		Poll::Ready(Err(Error::Reset))
	}
}

pub(crate) struct ZclReadState {
	pub seq: u8,
	pub records: Option<Result<Vec<u8>, Error>>,
	pub waker: Option<Waker>,
	pub timeout: Duration,
	pub start: Instant,
}

impl ZclReadState {
	pub fn new(seq: u8, timeout: Duration) -> Self {
		Self { seq, records: None, waker: None, timeout, start: Instant::now() }
	}

	fn complete(&mut self, result: Result<Vec<u8>, Error>) {
		if self.records.is_none() {
			self.records = Some(result);
		}
		if let Some(waker) = self.waker.take() {
			waker.wake();
		}
	}
}

///Future for the ZCL Read Attributes Response correlated by ZCL sequence.
pub struct ZclReadFuture {
	pub(crate) state: Arc<Mutex<ZclReadState>>,
	pub(crate) valid: bool,
}

impl Future for ZclReadFuture {
	type Output = Result<Vec<u8>, Error>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		if self.valid {
			let mut state = self.state.lock().unwrap();

			if let Some(records) = state.records.take() {
				return Poll::Ready(records);
			}
			state.waker = Some(cx.waker().clone());
			return Poll::Pending;
		}

		Poll::Ready(Err(Error::Reset))
	}
}

pub(crate) enum Msg {
	Request(Arc<Mutex<RequestState>>),
	ZclWait(Arc<Mutex<ZclReadState>>),
	SetHandler(Arc<dyn NcpHandler>),
	///Fire the reset command with every possible packet sequence, fail all
	///pending work and exit, releasing the stream.
	Reset { option: u8 },
	Close,
}

struct InFlight {
	frame: Vec<u8>,
	pkt_seq: u8,
	sent_at: Instant,
	retries: u8,
	state: Arc<Mutex<RequestState>>,
}

pub(crate) struct Processor<FS> {
	stream: FS,
	rx: Receiver<Msg>,
	handler: Option<Arc<dyn NcpHandler>>,
	reset_ind_tx: Sender<()>,
	//2-bit send sequence, cycles 1..=3; zero is reserved for acks
	pkt_seq: u8,
	tsn: u8,
	queue: VecDeque<Arc<Mutex<RequestState>>>,
	in_flight: Option<InFlight>,
	pending: Vec<Arc<Mutex<RequestState>>>,
	zcl_pending: Vec<Arc<Mutex<ZclReadState>>>,
	frame_in: FrameBuffer,
	out: VecDeque<Vec<u8>>,
	out_buf: FrameBuffer,
	read_backoff: Duration,
}

///Spawn the protocol loop over a stream. Returns the command channel and the
///channel signalled when NCPResetInd is seen.
pub(crate) fn spawn<FS: FrameStream + 'static>(stream: FS, handler: Option<Arc<dyn NcpHandler>>) -> (Sender<Msg>, Receiver<()>) {
	let (tx, rx) = channel::unbounded();
	let (reset_ind_tx, reset_ind_rx) = channel::bounded(1);

	let p = Processor {
		stream,
		rx,
		handler,
		reset_ind_tx,
		pkt_seq: 0,
		tsn: 0,
		queue: VecDeque::new(),
		in_flight: None,
		pending: Vec::new(),
		zcl_pending: Vec::new(),
		frame_in: FrameBuffer::default(),
		out: VecDeque::new(),
		out_buf: FrameBuffer::default(),
		read_backoff: READ_BACKOFF_MIN,
	};
	task::spawn(p.run());

	(tx, reset_ind_rx)
}

fn expire_request(state: &Arc<Mutex<RequestState>>) -> bool {
	let mut s = state.lock().unwrap();
	if s.response.is_none() && s.start.elapsed() > s.timeout {
		let call = hl::call_name(s.call_id);
		warn!(call = %call, tsn = ?s.tsn, "request deadline passed");
		s.complete(Err(Error::Timeout { call }));
	}
	s.response.is_some()
}

impl<FS: FrameStream> Processor<FS> {
	async fn run(mut self) {
		loop {
			//control channel first so new requests join this tick
			loop {
				match self.rx.try_recv() {
					Ok(Msg::Request(state)) => self.queue.push_back(state),
					Ok(Msg::ZclWait(state)) => self.zcl_pending.push(state),
					Ok(Msg::SetHandler(h)) => self.handler = Some(h),
					Ok(Msg::Reset { option }) => {
						self.fire_reset(option);
						self.fail_all(|| Error::Reset);
						return;
					},
					Ok(Msg::Close) => {
						self.fail_all(|| Error::Closed);
						return;
					},
					Err(TryRecvError::Empty) => break,
					Err(TryRecvError::Closed) => {
						self.fail_all(|| Error::Closed);
						return;
					}
				}
			}

			self.expire_deadlines();

			let mut backoff = None;
			for _ in 0..MAX_READS_PER_TICK {
				match ll::LlFrame::nonblocking_read_frame(&mut self.stream, &mut self.frame_in, &()) {
					Ok(Some(frame)) => {
						self.read_backoff = READ_BACKOFF_MIN;
						self.handle_frame(frame);
					},
					Ok(None) => break,
					Err(e) => {
						//crc failures resolve themselves via retransmission,
						//io errors back off and hope the port recovers
						warn!(err = %e, "ll frame read error");
						self.frame_in.clear();
						if e.need_reset() {
							backoff = Some(self.read_backoff);
							self.read_backoff = (self.read_backoff * 2).min(READ_BACKOFF_MAX);
						}
						break;
					}
				}
			}

			self.check_retransmit();
			self.start_next_request();
			self.pump_writes();

			task::sleep(backoff.unwrap_or(TICK)).await;
		}
	}

	fn fire_reset(&mut self, option: u8) {
		//post-restart the ncp's expected sequence is unknown, so send the
		//reset with all three; only the matching one is accepted and the ncp
		//reboots before acking
		self.tsn = self.tsn.wrapping_add(1);
		for seq in 1u8..=3 {
			let raw = ll::encode_data(seq, &hl::encode_request(hl::CMD_NCP_RESET, self.tsn, &[option]));
			self.write_all_blocking(&raw);
		}
		info!(option, "ncp reset command sent");
	}

	fn write_all_blocking(&mut self, frame: &[u8]) {
		use frames::FrameWrite;

		let mut pos = 0;
		for _ in 0..200 {
			match self.stream.write(&frame[pos..]) {
				Ok(n) => {
					pos += n;
					if pos >= frame.len() {
						let _ = self.stream.flush();
						return;
					}
				},
				Err(frames::Error::WouldBlock) => std::thread::sleep(Duration::from_millis(1)),
				Err(e) => {
					warn!(err = %e, "write during reset failed");
					return;
				}
			}
		}
	}

	fn fail_all<F: Fn() -> Error>(&mut self, err: F) {
		if let Some(in_flight) = self.in_flight.take() {
			in_flight.state.lock().unwrap().complete(Err(err()));
		}
		for state in self.pending.drain(..) {
			state.lock().unwrap().complete(Err(err()));
		}
		for state in self.queue.drain(..) {
			state.lock().unwrap().complete(Err(err()));
		}
		for state in self.zcl_pending.drain(..) {
			state.lock().unwrap().complete(Err(err()));
		}
	}

	fn expire_deadlines(&mut self) {
		//queued requests may expire before ever hitting the wire
		self.queue.retain(|s| !expire_request(s));
		self.pending.retain(|s| !expire_request(s));
		self.zcl_pending.retain(|s| {
			let mut st = s.lock().unwrap();
			if st.records.is_none() && st.start.elapsed() > st.timeout {
				st.complete(Err(Error::Timeout { call: "ZCL ReadAttributes".to_string() }));
			}
			st.records.is_none()
		});
	}

	fn handle_frame(&mut self, frame: ll::LlFrame) {
		if frame.is_ack() {
			let ack = frame.ack_seq();
			let matched = match &self.in_flight {
				Some(f) if f.pkt_seq == ack => true,
				Some(f) => {
					//stale ack from a previous exchange, keep waiting
					debug!(got = ack, want = f.pkt_seq, "stale ll ack drained");
					false
				},
				None => {
					debug!(ack, "unexpected ll ack ignored");
					false
				}
			};
			if matched {
				debug!(ack, "ll ack received");
				self.in_flight = None;
			}
			return;
		}

		//every data frame is acked immediately with its packet sequence
		self.out.push_back(ll::encode_ack(frame.pkt_seq()));

		let packet = match hl::decode(&frame.body) {
			Ok(p) => p,
			Err(e) => {
				warn!(err = %e, "hl decode error, frame dropped");
				return;
			}
		};

		match packet.packet_type {
			hl::PacketType::Response => self.handle_response(packet),
			hl::PacketType::Indication => self.handle_indication(packet),
			hl::PacketType::Request => {
				warn!(call = %hl::call_name(packet.call_id), "unexpected hl request from ncp");
			}
		}
	}

	fn handle_response(&mut self, packet: hl::HlPacket) {
		let idx = self.pending.iter().position(|s| {
			s.lock().unwrap().tsn == Some(packet.tsn)
		});

		match idx {
			Some(i) => {
				let state = self.pending.swap_remove(i);
				debug!(
					call = %hl::call_name(packet.call_id),
					tsn = packet.tsn,
					status = %hl::status_name(packet.status_cat, packet.status_code),
					"hl response"
				);
				state.lock().unwrap().complete(Ok(packet));
			},
			None => {
				warn!(
					call = %hl::call_name(packet.call_id),
					tsn = packet.tsn,
					status = %hl::status_name(packet.status_cat, packet.status_code),
					"orphaned response dropped"
				);
			}
		}
	}

	fn handle_indication(&mut self, packet: hl::HlPacket) {
		let handler = self.handler.clone();
		let payload = packet.payload.as_slice();

		match packet.call_id {
			hl::CMD_ZDO_DEV_ANNCE_IND => {
				match zdo::DevAnnceInd::parse(payload) {
					Ok(ind) => {
						info!(ieee = %hex_upper(&ind.ieee), short = %format_args!("{:#06X}", ind.nwk_addr), "device announce");
						if let Some(h) = handler {
							h.on_device_announce(DeviceAnnounceEvent {
								short_addr: ind.nwk_addr,
								ieee: ind.ieee,
								capability: ind.capability,
							});
						}
					},
					Err(e) => warn!(err = %e, "bad DevAnnceInd payload"),
				}
			},
			hl::CMD_ZDO_DEV_UPDATE_IND => {
				match zdo::DevUpdateInd::parse(payload) {
					Ok(ind) => {
						info!(
							ieee = %hex_upper(&ind.ieee),
							short = %format_args!("{:#06X}", ind.nwk_addr),
							status = zdo::dev_update_status_name(ind.status),
							"DevUpdateInd"
						);
						if let Some(h) = handler {
							match ind.status {
								zdo::DEV_UPDATE_SECURE_REJOIN
								| zdo::DEV_UPDATE_UNSECURE_JOIN
								| zdo::DEV_UPDATE_TC_REJOIN => {
									h.on_device_joined(DeviceJoinedEvent { short_addr: ind.nwk_addr, ieee: ind.ieee });
								},
								zdo::DEV_UPDATE_LEFT => {
									h.on_device_left(DeviceLeftEvent { short_addr: ind.nwk_addr, ieee: ind.ieee });
								},
								status => warn!(status, "DevUpdateInd unknown status"),
							}
						}
					},
					Err(e) => warn!(err = %e, "bad DevUpdateInd payload"),
				}
			},
			hl::CMD_NWK_LEAVE_IND => {
				match zdo::NwkLeaveInd::from_buf(payload) {
					Ok(ind) => {
						info!(ieee = %hex_upper(&ind.ieee), rejoin = ind.rejoin, "NwkLeaveInd");
						if !ind.rejoin {
							if let Some(h) = handler {
								h.on_device_left(DeviceLeftEvent { short_addr: 0, ieee: ind.ieee });
							}
						}
					},
					Err(e) => warn!(err = %e, "bad NwkLeaveInd payload"),
				}
			},
			hl::CMD_APSDE_DATA_IND => {
				self.handle_apsde_data_ind(payload);
			},
			hl::CMD_NCP_RESET_IND => {
				warn!("NCPResetInd received");
				let _ = self.reset_ind_tx.try_send(());
				//whatever was awaiting a response is gone with the old stack state
				self.fail_all(|| Error::Reset);
				if let Some(h) = handler {
					h.on_ncp_reset();
				}
			},
			hl::CMD_NWK_ADDR_UPDATE_IND => {
				if payload.len() >= 2 {
					let new_addr = u16::from_le_bytes([payload[0], payload[1]]);
					warn!(new_short = %format_args!("{:#06X}", new_addr), "device changed short address");
					if let Some(h) = handler {
						h.on_nwk_addr_update(new_addr);
					}
				}
			},
			hl::CMD_SECUR_TCLK_IND => {
				if payload.len() >= 8 {
					info!(ieee = %hex_upper(&payload[..8]), "TC link key exchanged");
				}
				else {
					info!(payload = %hex_upper(payload), "SECUR_TCLK_IND");
				}
			},
			hl::CMD_SECUR_TCLK_EXCHANGE_FAIL_IND => {
				if payload.len() >= 2 {
					warn!(status = %hl::status_name(payload[0], payload[1]), "TC link key exchange failed");
				}
			},
			hl::CMD_ZDO_DEV_AUTHORIZED_IND => {
				if payload.len() >= 8 {
					info!(ieee = %hex_upper(&payload[..8]), "device authorized");
				}
			},
			other => {
				warn!(call = %hl::call_name(other), payload = %hex_upper(payload), "unhandled indication");
			}
		}
	}

	fn handle_apsde_data_ind(&mut self, payload: &[u8]) {
		let ind = match aps::DataInd::from_buf(payload) {
			Ok(ind) => ind,
			Err(e) => {
				debug!(err = %e, "apsde data ind skipped");
				return;
			}
		};

		let header = match zcl::ZclHeader::parse(&ind.data) {
			Ok(h) => h,
			Err(e) => {
				debug!(err = %e, "zcl header parse failed");
				return;
			}
		};
		let records = &ind.data[header.header_len..];

		if header.frame_type() == zcl::FRAME_TYPE_CLUSTER {
			if ind.cluster_id == 0x0019 && header.command_id == 0x01 {
				//OTA QueryNextImageRequest: refuse asynchronously, the reply
				//has to go back through this loop so answering inline would
				//deadlock a blocking design; here it just joins the queue
				info!(
					short = %format_args!("{:#06X}", ind.src_nwk_addr),
					ep = ind.src_endpoint,
					"OTA query from device, responding NO_IMAGE_AVAILABLE"
				);
				self.queue_ota_no_image(ind.src_nwk_addr, ind.src_endpoint, header.sequence);
			}
			else if let Some(h) = self.handler.clone() {
				h.on_cluster_command(ClusterCommandEvent {
					src_addr: ind.src_nwk_addr,
					src_ep: ind.src_endpoint,
					cluster_id: ind.cluster_id,
					command_id: header.command_id,
					payload: records.to_vec(),
					lqi: ind.lqi,
					rssi: ind.rssi,
				});
			}
			return;
		}

		if header.frame_type() != zcl::FRAME_TYPE_GLOBAL {
			return;
		}

		match header.command_id {
			zcl::CMD_READ_ATTRIBUTES_RSP => {
				let idx = self.zcl_pending.iter().position(|s| s.lock().unwrap().seq == header.sequence);
				match idx {
					Some(i) => {
						let state = self.zcl_pending.swap_remove(i);
						state.lock().unwrap().complete(Ok(records.to_vec()));
					},
					None => {
						debug!(seq = header.sequence, "read attributes response with no waiter");
					}
				}
			},
			zcl::CMD_REPORT_ATTRIBUTES => {
				if let Some(h) = self.handler.clone() {
					for rec in zcl::parse_attribute_reports(records) {
						h.on_attribute_report(AttributeReportEvent {
							src_addr: ind.src_nwk_addr,
							src_ep: ind.src_endpoint,
							cluster_id: ind.cluster_id,
							attr_id: rec.attr_id,
							data_type: rec.data_type,
							value: rec.value,
							lqi: ind.lqi,
							rssi: ind.rssi,
						});
					}
				}
			},
			_ => {}
		}
	}

	fn queue_ota_no_image(&mut self, dst_addr: u16, dst_ep: u8, zcl_seq: u8) {
		//QueryNextImageResponse (cmd 0x02), status 0x98 NO_IMAGE_AVAILABLE
		let zcl_frame = [
			zcl::FRAME_TYPE_CLUSTER | zcl::DIR_SERVER_TO_CLIENT | zcl::DISABLE_DEFAULT_RESPONSE,
			zcl_seq,
			0x02,
			0x98,
		];
		let aps_payload = aps::build_data_req(dst_addr, dst_ep, 1, 0x0019, zcl::PROFILE_HA, 30, &zcl_frame);

		let state = RequestState::new(hl::CMD_APSDE_DATA_REQ, aps_payload, Duration::from_secs(5));
		self.queue.push_back(Arc::new(Mutex::new(state)));
	}

	fn check_retransmit(&mut self) {
		let timed_out = match &self.in_flight {
			Some(f) => f.sent_at.elapsed() > ACK_TIMEOUT,
			None => return,
		};
		if !timed_out {
			return;
		}

		let mut in_flight = self.in_flight.take().unwrap();

		if in_flight.retries >= MAX_RETRIES {
			let call = hl::call_name(in_flight.state.lock().unwrap().call_id);
			warn!(call = %call, pkt_seq = in_flight.pkt_seq, "ll ack never arrived, giving up");
			self.pending.retain(|s| !Arc::ptr_eq(s, &in_flight.state));
			in_flight.state.lock().unwrap().complete(Err(Error::AckTimeout { call }));
			return;
		}

		in_flight.retries += 1;
		in_flight.sent_at = Instant::now();
		ll::mark_retransmit(&mut in_flight.frame);
		warn!(attempt = in_flight.retries, pkt_seq = in_flight.pkt_seq, "ll ack timeout, retransmitting");
		self.out.push_back(in_flight.frame.clone());
		self.in_flight = Some(in_flight);
	}

	fn start_next_request(&mut self) {
		if self.in_flight.is_some() {
			return;
		}

		let state = loop {
			match self.queue.pop_front() {
				Some(state) => {
					//skip anything that expired while queued
					if state.lock().unwrap().response.is_none() {
						break state;
					}
				},
				None => return,
			}
		};

		let frame = {
			let mut s = state.lock().unwrap();

			self.tsn = self.tsn.wrapping_add(1);
			self.pkt_seq = self.pkt_seq % 3 + 1;
			s.tsn = Some(self.tsn);

			debug!(
				call = %hl::call_name(s.call_id),
				tsn = self.tsn,
				pkt_seq = self.pkt_seq,
				payload = %hex_upper(&s.payload),
				"hl request"
			);
			ll::encode_data(self.pkt_seq, &hl::encode_request(s.call_id, self.tsn, &s.payload))
		};

		self.in_flight = Some(InFlight {
			frame: frame.clone(),
			pkt_seq: self.pkt_seq,
			sent_at: Instant::now(),
			retries: 0,
			state: state.clone(),
		});
		self.out.push_back(frame);
		self.pending.push(state);
	}

	fn pump_writes(&mut self) {
		loop {
			if self.out_buf.is_empty() {
				match self.out.pop_front() {
					Some(frame) => {
						if self.out_buf.push_bytes(frame).is_err() {
							return;
						}
					},
					None => return,
				}
			}

			match self.out_buf.nonblocking_write(&mut self.stream) {
				Ok(true) => continue,
				Ok(false) => return,
				Err(e) => {
					warn!(err = %e, "serial write error");
					self.out_buf.clear();
					return;
				}
			}
		}
	}
}

fn hex_upper(data: &[u8]) -> String {
	let mut s = String::with_capacity(data.len() * 2);
	for b in data {
		s.push_str(&format!("{:02X}", b));
	}
	s
}
