use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use pbgzf_core::{
    BgzfStream, CompressionLevel, OpenMode, PbgzfError, PipelineConfig, PipelineReader,
    PipelineState, PipelineWriter, Released, VirtualOffset, compress_stream,
};

fn config() -> PipelineConfig {
    PipelineConfig::default()
        .with_workers(3)
        .with_queue_capacity(4)
}

fn records(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|n| format!("record {n:05} {}\n", "payload ".repeat(n % 40)).into_bytes())
        .collect()
}

#[test]
fn tell_and_seek_revisit_block_boundaries() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("indexed.gz");
    let records = records(400);

    let mut offsets = Vec::new();
    let mut writer = PipelineWriter::new(File::create(&path)?, config())?;
    for (n, record) in records.iter().enumerate() {
        if n % 50 == 0 {
            offsets.push((n, writer.tell()?));
        }
        writer.write_all(record)?;
    }
    writer.close()?;

    // Every tell() flushed, so each offset starts a fresh block.
    for pair in offsets.windows(2) {
        assert!(pair[0].1 < pair[1].1);
        assert_eq!(pair[1].1.within_block(), 0);
    }

    let mut reader = PipelineReader::new(File::open(&path)?, config())?;
    for &(n, offset) in offsets.iter().rev() {
        assert_eq!(reader.seek(offset)?, offset);
        assert_eq!(reader.tell(), offset);

        let mut buf = vec![0u8; records[n].len()];
        reader.read_exact(&mut buf)?;
        assert_eq!(buf, records[n], "record {n} at {offset}");
    }
    assert_eq!(reader.stats().restarts, offsets.len() as u64);
    Ok(())
}

#[test]
fn tell_inside_a_block_seeks_back_to_the_same_byte() -> Result<(), Box<dyn std::error::Error>> {
    let input: Vec<u8> = (0..300_000u32).map(|n| (n * 7 % 253) as u8).collect();
    let (compressed, _) = compress_stream(Cursor::new(input.clone()), Vec::new(), &config())?;

    let mut reader = PipelineReader::new(Cursor::new(compressed), config())?;
    let mut consumed = 0usize;
    let mut marks = Vec::new();
    let mut buf = vec![0u8; 10_007];
    loop {
        marks.push((consumed, reader.tell()));
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        consumed += n;
    }
    assert_eq!(consumed, input.len());
    assert!(marks.iter().any(|(_, offset)| offset.within_block() != 0));

    for &(position, offset) in marks.iter().rev().step_by(3) {
        reader.seek(offset)?;
        let mut probe = vec![0u8; 64usize.min(input.len() - position)];
        reader.read_exact(&mut probe)?;
        assert_eq!(probe, &input[position..position + probe.len()], "offset {offset}");
    }
    Ok(())
}

#[test]
fn seek_past_block_end_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let (compressed, _) =
        compress_stream(Cursor::new(b"tiny block".to_vec()), Vec::new(), &config())?;

    let mut reader = PipelineReader::new(Cursor::new(compressed), config())?;
    let error = reader
        .seek(VirtualOffset::new(0, 500))
        .err()
        .ok_or("seek past the block end succeeded")?;
    assert!(matches!(error, PbgzfError::InvalidSeek { .. }));
    assert!(error.is_usage());

    // The stream is still usable from the start of the block.
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    assert_eq!(out, b"tiny block");
    Ok(())
}

#[test]
fn rejected_seek_keeps_the_read_position() -> Result<(), Box<dyn std::error::Error>> {
    let (compressed, _) =
        compress_stream(Cursor::new(b"0123456789".to_vec()), Vec::new(), &config())?;

    let mut reader = PipelineReader::new(Cursor::new(compressed), config())?;
    let mut head = [0u8; 5];
    reader.read_exact(&mut head)?;
    let before = reader.tell();
    assert_eq!(before, VirtualOffset::new(0, 5));

    for bad in [VirtualOffset::new(0, 500), VirtualOffset::new(0, 11)] {
        let error = reader.seek(bad).err().ok_or("seek past the block end succeeded")?;
        assert!(matches!(error, PbgzfError::InvalidSeek { .. }));
        assert_eq!(reader.tell(), before);
        assert_eq!(reader.state(), PipelineState::Running);
    }

    let mut rest = String::new();
    reader.read_to_string(&mut rest)?;
    assert_eq!(rest, "56789");
    Ok(())
}

#[test]
fn io_seek_uses_raw_virtual_offsets() -> Result<(), Box<dyn std::error::Error>> {
    let input = b"0123456789abcdef".repeat(100);
    let (compressed, _) = compress_stream(Cursor::new(input.clone()), Vec::new(), &config())?;

    let mut reader = PipelineReader::new(Cursor::new(compressed), config())?;
    let mut skip = [0u8; 10];
    reader.read_exact(&mut skip)?;
    let here = reader.stream_position()?;
    assert_eq!(VirtualOffset::from_raw(here), VirtualOffset::new(0, 10));

    let mut rest = Vec::new();
    reader.read_to_end(&mut rest)?;
    Seek::seek(&mut reader, SeekFrom::Start(here))?;
    let mut again = Vec::new();
    reader.read_to_end(&mut again)?;
    assert_eq!(rest, again);
    assert_eq!(again, &input[10..]);

    assert!(Seek::seek(&mut reader, SeekFrom::End(0)).is_err());
    Ok(())
}

#[test]
fn stream_handle_writes_then_reads() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("handle.gz");

    let mut stream = BgzfStream::open(&path, OpenMode::Write, CompressionLevel::new(9))?;
    assert_eq!(stream.mode(), OpenMode::Write);
    stream.write(b"hello, ")?;
    let mark = stream.tell()?;
    stream.write(b"block world")?;
    stream.close()?;
    assert_eq!(stream.state(), PipelineState::Closed);

    let mut stream = BgzfStream::open(&path, OpenMode::parse("rb")?, CompressionLevel::default())?;
    assert!(stream.has_eof_marker()?);
    let mut text = String::new();
    stream.read_to_string(&mut text)?;
    assert_eq!(text, "hello, block world");

    stream.seek(mark)?;
    let mut tail = String::new();
    stream.read_to_string(&mut tail)?;
    assert_eq!(tail, "block world");
    stream.close()?;
    Ok(())
}

#[test]
fn wrong_mode_calls_are_usage_errors() -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = BgzfStream::from_writer(Vec::new(), config())?;
    let mut buf = [0u8; 4];
    assert!(matches!(writer.read(&mut buf), Err(PbgzfError::Usage(_))));
    assert!(matches!(writer.seek(VirtualOffset::new(0, 0)), Err(PbgzfError::Usage(_))));
    assert!(matches!(writer.has_eof_marker(), Err(PbgzfError::Usage(_))));
    // Rejected calls leave the stream usable.
    assert_eq!(writer.write(b"still fine")?, 10);
    writer.close()?;
    assert!(matches!(writer.close(), Err(PbgzfError::Usage(_))));
    assert!(matches!(writer.write(b"x"), Err(PbgzfError::Usage(_))));

    let (compressed, _) = compress_stream(Cursor::new(b"data".to_vec()), Vec::new(), &config())?;
    let mut reader = BgzfStream::from_reader(Cursor::new(compressed), config())?;
    assert!(matches!(reader.write(b"nope"), Err(PbgzfError::Usage(_))));
    assert!(matches!(reader.flush(), Err(PbgzfError::Usage(_))));
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    assert_eq!(out, b"data");
    Ok(())
}

#[test]
fn open_mode_parsing() {
    assert!(matches!(OpenMode::parse("r"), Ok(OpenMode::Read)));
    assert!(matches!(OpenMode::parse("wb"), Ok(OpenMode::Write)));
    assert!(matches!(OpenMode::parse("rw"), Err(PbgzfError::Usage(_))));
    assert!(matches!(OpenMode::parse(""), Err(PbgzfError::Usage(_))));
}

#[test]
fn opening_a_missing_file_names_the_path() {
    let missing = std::env::temp_dir().join("pbgzf-definitely-missing.gz");
    match BgzfStream::open(&missing, OpenMode::Read, CompressionLevel::default()) {
        Err(error) => {
            assert!(error.to_string().contains("pbgzf-definitely-missing.gz"));
            assert!(!error.is_protocol());
        }
        Ok(_) => panic!("opened a missing file"),
    }
}

#[test]
fn compression_level_requests_are_clamped() {
    assert_eq!(CompressionLevel::new(-1), CompressionLevel::default());
    assert_eq!(CompressionLevel::new(4).level(), 4);
    assert_eq!(CompressionLevel::new(42), CompressionLevel::BEST);
}

struct SharedSink {
    bytes: Arc<Mutex<Vec<u8>>>,
    dropped: Arc<AtomicBool>,
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.bytes
            .lock()
            .map_err(|_| std::io::Error::other("sink lock poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for SharedSink {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::Release);
    }
}

#[test]
fn close_hands_back_a_caller_owned_sink() -> Result<(), Box<dyn std::error::Error>> {
    let bytes = Arc::new(Mutex::new(Vec::new()));
    let dropped = Arc::new(AtomicBool::new(false));
    let sink = SharedSink {
        bytes: Arc::clone(&bytes),
        dropped: Arc::clone(&dropped),
    };

    let mut stream = BgzfStream::from_writer(sink, config())?;
    stream.write_all(b"kept open by the caller")?;
    let released = stream.close()?;
    assert!(!dropped.load(Ordering::Acquire), "close dropped the caller's sink");

    let mut sink = match released {
        Some(Released::Sink(sink)) => sink,
        other => panic!("expected the sink back, got {other:?}"),
    };
    sink.write_all(b"trailing bytes")?;
    drop(sink);
    assert!(dropped.load(Ordering::Acquire));

    let written = bytes.lock().map_err(|_| "sink lock poisoned")?.clone();
    assert!(written.ends_with(b"trailing bytes"));
    let container = &written[..written.len() - b"trailing bytes".len()];
    let mut reader = PipelineReader::new(Cursor::new(container.to_vec()), config())?;
    assert!(reader.has_eof_marker());
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    assert_eq!(text, "kept open by the caller");
    Ok(())
}

#[test]
fn close_hands_back_a_caller_owned_source() -> Result<(), Box<dyn std::error::Error>> {
    let (compressed, _) = compress_stream(Cursor::new(b"source".to_vec()), Vec::new(), &config())?;
    let mut stream = BgzfStream::from_reader(Cursor::new(compressed), config())?;
    let mut out = Vec::new();
    stream.read_to_end(&mut out)?;
    assert!(matches!(stream.close()?, Some(Released::Source(_))));
    Ok(())
}

#[test]
fn close_releases_a_file_opened_by_path() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("owned.gz");
    let mut stream = BgzfStream::open(&path, OpenMode::Write, CompressionLevel::default())?;
    stream.write(b"owned")?;
    assert!(stream.close()?.is_none());
    Ok(())
}
