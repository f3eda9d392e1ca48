//! Response aggregator: merges parsed frames into a de-duplicated
//! service catalogue and an intercepted-questions list, and promotes
//! PTR targets into the controller's follow-up query set.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use crate::discovery::DiscoveryHandle;
use crate::socket::MDNS_PORT;
use crate::wire::rr::TYPE_PTR;
use crate::wire::{Frame, RData};

const MAX_INTERCEPTED_QUESTIONS: usize = 15;
const GENERIC_QUERY_NAME: &str = "_services._dns-sd._udp.local";

/// The aggregator's per-service record, keyed by name.
#[derive(Debug, Clone)]
pub struct ScanCardEntry {
    pub name: String,
    pub ip_addresses: Vec<String>,
    pub port: u16,
    pub dissector_meta: Vec<RData>,
    pub time_of_arrival: Instant,
}

impl PartialEq for ScanCardEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for ScanCardEntry {}

/// An intercepted question, keyed by (name, first IP).
#[derive(Debug, Clone)]
pub struct QuestionCardEntry {
    pub name: String,
    pub ip: String,
    pub time_of_arrival: Instant,
}

impl PartialEq for QuestionCardEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.ip == other.ip
    }
}
impl Eq for QuestionCardEntry {}

/// De-duplicates and merges discovered services across frames. Guarded
/// by two mutexes, one per catalogue, never held simultaneously; the
/// follow-up set lives behind the `DiscoveryHandle` it was constructed
/// with.
pub struct Aggregator {
    services: Mutex<Vec<ScanCardEntry>>,
    questions: Mutex<VecDeque<QuestionCardEntry>>,
    discovery: DiscoveryHandle,
}

impl Aggregator {
    pub fn new(discovery: DiscoveryHandle) -> Self {
        Aggregator {
            services: Mutex::new(Vec::new()),
            questions: Mutex::new(VecDeque::new()),
            discovery,
        }
    }

    pub fn services(&self) -> Vec<ScanCardEntry> {
        self.services.lock().unwrap().clone()
    }

    pub fn intercepted_questions(&self) -> Vec<QuestionCardEntry> {
        self.questions.lock().unwrap().iter().cloned().collect()
    }

    /// Consume a batch of frames from one controller iteration.
    pub fn on_frames(&self, frames: &[Frame]) {
        for frame in frames {
            self.on_frame(frame);
        }
        self.maybe_schedule_prompt_resolution();
    }

    fn on_frame(&self, frame: &Frame) {
        let advertised = frame
            .advertised_ip
            .as_deref()
            .map(|ip| !ip.is_empty())
            .unwrap_or(false);
        let effective_ip = if advertised {
            frame.advertised_ip.clone().unwrap()
        } else {
            frame.source.ip().to_string()
        };

        for rr in frame
            .answers
            .iter()
            .chain(frame.additionals.iter())
            .chain(frame.authorities.iter())
        {
            let port = rr.srv_port().unwrap_or_else(|| frame.source.port());

            self.try_add_service(
                rr.name.clone(),
                effective_ip.clone(),
                port,
                rr.rdata.clone(),
                advertised,
                frame.received_at,
            );

            if rr.rtype == TYPE_PTR {
                if let RData::Ptr { target } = &rr.rdata {
                    self.discovery.add_follow_up(target);
                }
            }
        }

        for question in &frame.questions {
            self.intercept_question(question.name.clone(), effective_ip.clone(), frame.received_at);
        }
    }

    fn try_add_service(
        &self,
        name: String,
        ip: String,
        port: u16,
        rdata: RData,
        advertised: bool,
        arrival: Instant,
    ) {
        let mut services = self.services.lock().unwrap();

        let existing = services.iter_mut().find(|e| e.name == name);
        let Some(existing) = existing else {
            services.insert(
                0,
                ScanCardEntry {
                    name,
                    ip_addresses: vec![ip],
                    port,
                    dissector_meta: vec![rdata],
                    time_of_arrival: arrival,
                },
            );
            return;
        };

        if !existing.dissector_meta.iter().any(|m| *m == rdata) {
            existing.dissector_meta.push(rdata);
        }

        if existing.port == MDNS_PORT && existing.port != port {
            existing.port = port;
        }

        existing.time_of_arrival = arrival;

        if advertised {
            existing.ip_addresses = vec![ip];
        } else if !existing.ip_addresses.contains(&ip) {
            existing.ip_addresses.push(ip);
            sort_ips(&mut existing.ip_addresses);
        }
    }

    fn intercept_question(&self, name: String, ip: String, arrival: Instant) {
        let mut questions = self.questions.lock().unwrap();
        if questions.iter().any(|q| q.name == name && q.ip == ip) {
            return;
        }
        questions.push_front(QuestionCardEntry {
            name,
            ip,
            time_of_arrival: arrival,
        });
        while questions.len() > MAX_INTERCEPTED_QUESTIONS {
            questions.pop_back();
        }
    }

    fn maybe_schedule_prompt_resolution(&self) {
        let services = self.services.lock().unwrap();
        if services.is_empty() {
            return;
        }
        let resolved = services
            .iter()
            .any(|e| !e.name.is_empty() && e.name != GENERIC_QUERY_NAME);
        if !resolved {
            drop(services);
            self.discovery.schedule_query_now();
        }
    }
}

fn sort_ips(ips: &mut [String]) {
    ips.sort_by(|a, b| {
        let a4 = !a.contains(':');
        let b4 = !b.contains(':');
        if a4 != b4 {
            return b4.cmp(&a4);
        }
        a.cmp(b)
    });
}
