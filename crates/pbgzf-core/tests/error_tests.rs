use std::io;

use pbgzf_core::PbgzfError;

#[test]
fn converts_io_error() {
    let error: PbgzfError = io::Error::new(io::ErrorKind::NotFound, "missing").into();

    match error {
        PbgzfError::Io(err) => assert_eq!(err.kind(), io::ErrorKind::NotFound),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn converts_anyhow_error() {
    let error: PbgzfError = anyhow::anyhow!("boom").into();

    match error {
        PbgzfError::Other(err) => assert_eq!(err.to_string(), "boom"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn attaches_context() {
    let error = PbgzfError::Usage("bad call").with_context("while seeking");

    match &error {
        PbgzfError::Context { context, source } => {
            assert_eq!(context, "while seeking");
            assert!(matches!(**source, PbgzfError::Usage("bad call")));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(error.to_string(), "while seeking: invalid usage: bad call");
}

#[test]
fn classification_sees_through_context() {
    let protocol = PbgzfError::ChecksumMismatch {
        offset: 0,
        expected: 1,
        actual: 2,
    }
    .with_context("block 4");
    assert!(protocol.is_protocol());
    assert!(!protocol.is_usage());

    let usage = PbgzfError::InvalidSeek {
        position: 0x10,
        reason: "offset past the end of the block",
    };
    assert!(usage.is_usage());
    assert!(!usage.is_protocol());

    assert!(!PbgzfError::PipelineFailed.is_protocol());
    assert!(!PbgzfError::Thread("gone".into()).is_usage());
}

#[test]
fn maps_into_io_error_kinds() {
    let data: io::Error = PbgzfError::InvalidHeader {
        offset: 12,
        reason: "bad gzip magic",
    }
    .into();
    assert_eq!(data.kind(), io::ErrorKind::InvalidData);

    let input: io::Error = PbgzfError::Usage("wrong mode").into();
    assert_eq!(input.kind(), io::ErrorKind::InvalidInput);

    let passthrough: io::Error =
        PbgzfError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe")).into();
    assert_eq!(passthrough.kind(), io::ErrorKind::BrokenPipe);

    let other: io::Error = PbgzfError::PipelineFailed.into();
    assert_eq!(other.kind(), io::ErrorKind::Other);
}
