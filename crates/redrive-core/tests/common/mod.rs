#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redrive::{Message, QueueSettings, QueueTransport, ReceiveOptions, RedrivePolicy};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn queue_url(name: &str) -> String {
    format!("https://sqs.eu-central-1.amazonaws.com/000000000000/{name}")
}

pub fn queue_arn(name: &str) -> String {
    format!("arn:aws:sqs:eu-central-1:000000000000:{name}")
}

/// Settings with a short wait so idle receives return quickly, and no
/// visibility timeout so abandoned messages are redelivered on the next receive.
pub fn fast_settings() -> QueueSettings {
    QueueSettings {
        wait_time: Duration::from_millis(5),
        visibility_timeout: Duration::ZERO,
        ..QueueSettings::default()
    }
}

#[derive(Default)]
struct FakeQueue {
    name: String,
    attributes: HashMap<String, String>,
    visible: VecDeque<Message>,
    in_flight: Vec<(Instant, Message)>,
}

#[derive(Default)]
struct State {
    queues: HashMap<String, FakeQueue>,
    created: Vec<(String, HashMap<String, String>)>,
    fail_create: HashSet<String>,
    fail_describe: bool,
    omit_arn: bool,
    fail_sends: usize,
    fail_receives: usize,
    fail_deletes: usize,
    sends: usize,
    receives: usize,
    deletes: usize,
    next_id: usize,
}

/// In-memory stand-in for SQS.
///
/// A message that was received but not deleted becomes visible again on the
/// first receive after its visibility timeout, unless its receive count has
/// reached the redrive policy's limit, in which case it moves to the dead
/// letter queue.
#[derive(Default)]
pub struct FakeTransport {
    state: Mutex<State>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_create_of(&self, name: &str) {
        self.state.lock().unwrap().fail_create.insert(name.to_string());
    }

    pub fn fail_describe(&self) {
        self.state.lock().unwrap().fail_describe = true;
    }

    pub fn omit_arn(&self) {
        self.state.lock().unwrap().omit_arn = true;
    }

    pub fn fail_next_sends(&self, count: usize) {
        self.state.lock().unwrap().fail_sends = count;
    }

    pub fn fail_next_receives(&self, count: usize) {
        self.state.lock().unwrap().fail_receives = count;
    }

    pub fn fail_next_deletes(&self, count: usize) {
        self.state.lock().unwrap().fail_deletes = count;
    }

    /// Names and attributes passed to `create_queue`, in call order.
    pub fn created(&self) -> Vec<(String, HashMap<String, String>)> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn queue_exists(&self, name: &str) -> bool {
        self.state.lock().unwrap().queues.contains_key(&queue_url(name))
    }

    /// Puts a raw body straight onto a queue, bypassing the codec.
    pub fn enqueue_raw(&self, url: &str, body: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let message_id = format!("msg-{}", state.next_id);
        let queue = state.queues.get_mut(url).expect("queue exists");
        queue.visible.push_back(Message {
            message_id: message_id.clone(),
            receipt_handle: String::new(),
            body: body.to_string(),
            receive_count: Some(0),
        });
        message_id
    }

    pub fn visible(&self, url: &str) -> usize {
        self.state.lock().unwrap().queues[url].visible.len()
    }

    pub fn in_flight(&self, url: &str) -> usize {
        self.state.lock().unwrap().queues[url].in_flight.len()
    }

    pub fn sends(&self) -> usize {
        self.state.lock().unwrap().sends
    }

    pub fn receives(&self) -> usize {
        self.state.lock().unwrap().receives
    }

    pub fn deletes(&self) -> usize {
        self.state.lock().unwrap().deletes
    }

    fn release_in_flight(state: &mut State, url: &str) {
        let (expired, redrive) = {
            let queue = state.queues.get_mut(url).expect("queue exists");
            let now = Instant::now();
            let (expired, hidden): (Vec<_>, Vec<_>) = queue
                .in_flight
                .drain(..)
                .partition(|(visible_at, _)| *visible_at <= now);
            queue.in_flight = hidden;
            let redrive = queue
                .attributes
                .get("RedrivePolicy")
                .map(|policy| RedrivePolicy::from_attribute(policy).unwrap());
            (expired, redrive)
        };

        for (_, message) in expired {
            let exhausted = match &redrive {
                Some(policy) => message.receive_count.unwrap_or(0) >= policy.max_receive_count,
                None => false,
            };
            let target = match (&redrive, exhausted) {
                (Some(policy), true) => {
                    let name = policy.dead_letter_target_arn.rsplit(':').next().unwrap();
                    queue_url(name)
                }
                _ => url.to_string(),
            };
            let mut message = message;
            if target != url {
                message.receive_count = Some(0);
            }
            state
                .queues
                .get_mut(&target)
                .expect("target queue exists")
                .visible
                .push_back(message);
        }
    }
}

#[async_trait]
impl QueueTransport for FakeTransport {
    async fn create_queue(
        &self,
        name: &str,
        attributes: HashMap<String, String>,
    ) -> anyhow::Result<String> {
        let mut state = self.state.lock().unwrap();
        state.created.push((name.to_string(), attributes.clone()));
        if state.fail_create.contains(name) {
            anyhow::bail!("AccessDenied: not allowed to create {name}");
        }

        let url = queue_url(name);
        let queue = state.queues.entry(url.clone()).or_default();
        queue.name = name.to_string();
        queue.attributes.extend(attributes);
        Ok(url)
    }

    async fn get_queue_attributes(
        &self,
        queue_url: &str,
        names: &[&str],
    ) -> anyhow::Result<HashMap<String, String>> {
        let state = self.state.lock().unwrap();
        if state.fail_describe {
            anyhow::bail!("ServiceUnavailable");
        }
        let Some(queue) = state.queues.get(queue_url) else {
            anyhow::bail!("QueueDoesNotExist: {queue_url}");
        };

        let mut attributes = queue.attributes.clone();
        if !state.omit_arn {
            attributes.insert("QueueArn".to_string(), queue_arn(&queue.name));
        }
        attributes.retain(|key, _| names.contains(&key.as_str()));
        Ok(attributes)
    }

    async fn send_message(&self, queue_url: &str, body: &str) -> anyhow::Result<String> {
        {
            let mut state = self.state.lock().unwrap();
            state.sends += 1;
            if state.fail_sends > 0 {
                state.fail_sends -= 1;
                anyhow::bail!("RequestThrottled");
            }
            if !state.queues.contains_key(queue_url) {
                anyhow::bail!("QueueDoesNotExist: {queue_url}");
            }
        }
        Ok(self.enqueue_raw(queue_url, body))
    }

    async fn receive_message(
        &self,
        queue_url: &str,
        options: ReceiveOptions,
    ) -> anyhow::Result<Option<Message>> {
        assert_eq!(options.max_messages, 1);

        let received = {
            let mut state = self.state.lock().unwrap();
            state.receives += 1;
            if state.fail_receives > 0 {
                state.fail_receives -= 1;
                anyhow::bail!("connection reset");
            }
            if !state.queues.contains_key(queue_url) {
                anyhow::bail!("QueueDoesNotExist: {queue_url}");
            }

            Self::release_in_flight(&mut state, queue_url);

            let queue = state.queues.get_mut(queue_url).expect("queue exists");
            queue.visible.pop_front().map(|mut message| {
                let count = message.receive_count.unwrap_or(0) + 1;
                message.receive_count = Some(count);
                message.receipt_handle = format!("{}-receipt-{}", message.message_id, count);
                let visible_at = Instant::now() + options.visibility_timeout;
                queue.in_flight.push((visible_at, message.clone()));
                message
            })
        };

        if received.is_none() {
            tokio::time::sleep(options.wait_time.min(Duration::from_millis(20))).await;
        }
        Ok(received)
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_deletes > 0 {
            state.fail_deletes -= 1;
            anyhow::bail!("InternalError");
        }

        let queue = state.queues.get_mut(queue_url).expect("queue exists");
        let before = queue.in_flight.len();
        queue
            .in_flight
            .retain(|(_, message)| message.receipt_handle != receipt_handle);
        if queue.in_flight.len() == before {
            anyhow::bail!("ReceiptHandleIsInvalid: {receipt_handle}");
        }
        state.deletes += 1;
        Ok(())
    }
}
