use async_trait::async_trait;
use protocol::seq::SeqNum;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// One record per classified packet, in engine emission order (which is not
///  necessarily wall-clock arrival order when reordering is active).
#[derive(Clone, Debug, PartialEq)]
pub struct DeliveryRecord {
    /// wall-clock arrival, seconds since the Unix epoch
    pub arrival_time: f64,
    pub device_id: u16,
    pub seq_num: SeqNum,
    /// send-side header timestamp, whole seconds since the Unix epoch
    pub send_timestamp: u32,
    pub duplicate: bool,
    pub gap: bool,
    /// number of sequence numbers missing right before this packet
    pub gap_size: u16,
    pub num_readings: usize,
    pub batched: bool,
    pub packet_size_bytes: usize,
    /// per-packet processing cost in milliseconds
    pub cpu_time_ms: f64,
}

/// Append-only consumer of delivery records. The engine guarantees exactly
///  one record per non-discarded packet, with mutually consistent flags
///  (a duplicate never also counts as causing a gap).
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn record(&mut self, record: DeliveryRecord) -> anyhow::Result<()>;

    async fn flush(&mut self) -> anyhow::Result<()>;
}

/// Writes one CSV row per record, analysis-friendly and append-only.
pub struct CsvSink {
    writer: BufWriter<File>,
}

impl CsvSink {
    const HEADER: &'static str = "arrival_time,device_id,seq_num,send_timestamp,duplicate_flag,gap_flag,gap_size,num_readings,is_batched,packet_size_bytes,cpu_time_ms\n";

    pub async fn create(path: &Path) -> anyhow::Result<CsvSink> {
        let file = File::create(path).await?;
        let mut writer = BufWriter::new(file);
        writer.write_all(Self::HEADER.as_bytes()).await?;
        Ok(CsvSink { writer })
    }
}

#[async_trait]
impl MetricsSink for CsvSink {
    async fn record(&mut self, r: DeliveryRecord) -> anyhow::Result<()> {
        let row = format!(
            "{:.3},{},{},{},{},{},{},{},{},{},{:.3}\n",
            r.arrival_time,
            r.device_id,
            r.seq_num,
            r.send_timestamp,
            r.duplicate as u8,
            r.gap as u8,
            r.gap_size,
            r.num_readings,
            r.batched as u8,
            r.packet_size_bytes,
            r.cpu_time_ms,
        );
        self.writer.write_all(row.as_bytes()).await?;
        Ok(())
    }

    async fn flush(&mut self) -> anyhow::Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// in-memory sink for tests: records are shared with the test through a
///  handle that outlives the engine
#[cfg(test)]
pub struct MemorySink {
    records: std::sync::Arc<std::sync::Mutex<Vec<DeliveryRecord>>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn new() -> (MemorySink, std::sync::Arc<std::sync::Mutex<Vec<DeliveryRecord>>>) {
        let records = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        (MemorySink { records: records.clone() }, records)
    }
}

#[cfg(test)]
#[async_trait]
impl MetricsSink for MemorySink {
    async fn record(&mut self, record: DeliveryRecord) -> anyhow::Result<()> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }

    async fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::fs;

    fn test_record() -> DeliveryRecord {
        DeliveryRecord {
            arrival_time: 1700000000.5,
            device_id: 3,
            seq_num: SeqNum::from_raw(17),
            send_timestamp: 1700000000,
            duplicate: false,
            gap: true,
            gap_size: 2,
            num_readings: 4,
            batched: true,
            packet_size_bytes: 28,
            cpu_time_ms: 1.5,
        }
    }

    #[tokio::test]
    async fn test_csv_sink_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry_log.csv");

        let mut sink = CsvSink::create(&path).await.unwrap();
        sink.record(test_record()).await.unwrap();

        let mut duplicate = test_record();
        duplicate.duplicate = true;
        duplicate.gap = false;
        duplicate.gap_size = 0;
        sink.record(duplicate).await.unwrap();
        sink.flush().await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CsvSink::HEADER.trim_end());
        assert_eq!(lines[1], "1700000000.500,3,17,1700000000,0,1,2,4,1,28,1.500");
        assert_eq!(lines[2], "1700000000.500,3,17,1700000000,1,0,0,4,1,28,1.500");
    }
}
