use anyhow::Result;
use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    error::KafkaError,
    message::Message,
    TopicPartitionList,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

/// A message as it crosses the transport seam: position plus raw bytes.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Option<Vec<u8>>,
}

/// Transport seam for the consumer runtime.
#[async_trait]
pub trait EventReader: Send {
    /// Wait up to `timeout` for the next message. `Ok(None)` means the
    /// interval elapsed without one.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<ReceivedMessage>>;

    /// Synchronously commit the offset following `message`. Called only
    /// after the message has been dispatched.
    async fn commit(&mut self, message: &ReceivedMessage) -> Result<()>;
}

/// Kafka reader with manual offset commits. Auto-commit is disabled so
/// an offset is never recorded before its message has been dispatched.
pub struct KafkaEventReader {
    consumer: StreamConsumer,
}

impl KafkaEventReader {
    pub fn new(brokers: &str, group_id: &str, topics: &[&str]) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "6000")
            .create()?;

        consumer.subscribe(topics)?;

        info!(
            group_id = %group_id,
            topics = ?topics,
            "Subscribed to inbound topics"
        );

        Ok(Self { consumer })
    }
}

#[async_trait]
impl EventReader for KafkaEventReader {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<ReceivedMessage>> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_elapsed) => Ok(None),
            Ok(Ok(message)) => Ok(Some(ReceivedMessage {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                key: message
                    .key()
                    .map(|k| String::from_utf8_lossy(k).into_owned()),
                payload: message.payload().map(<[u8]>::to_vec),
            })),
            // End of a partition is a position, not a failure.
            Ok(Err(KafkaError::PartitionEOF(_))) => Ok(None),
            Ok(Err(e)) => Err(e.into()),
        }
    }

    async fn commit(&mut self, message: &ReceivedMessage) -> Result<()> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            rdkafka::Offset::Offset(message.offset + 1),
        )?;
        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(|e| anyhow::anyhow!("Failed to commit offset: {e}"))?;
        Ok(())
    }
}

/// Scripted reader for tests: hands out queued messages and records
/// every committed position. Clones share state so a test can keep a
/// handle while the runtime owns another.
#[derive(Debug, Default, Clone)]
pub struct ScriptedEventReader {
    queue: Arc<Mutex<VecDeque<ReceivedMessage>>>,
    committed: Arc<Mutex<Vec<(String, i32, i64)>>>,
}

impl ScriptedEventReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, message: ReceivedMessage) {
        self.queue.lock().await.push_back(message);
    }

    pub async fn committed(&self) -> Vec<(String, i32, i64)> {
        self.committed.lock().await.clone()
    }
}

#[async_trait]
impl EventReader for ScriptedEventReader {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<ReceivedMessage>> {
        let next = self.queue.lock().await.pop_front();
        if next.is_none() {
            tokio::time::sleep(timeout).await;
        }
        Ok(next)
    }

    async fn commit(&mut self, message: &ReceivedMessage) -> Result<()> {
        self.committed.lock().await.push((
            message.topic.clone(),
            message.partition,
            message.offset + 1,
        ));
        Ok(())
    }
}
