//! End-to-end tests against an in-process fake daemon.

use std::io::{self, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use clamwire::{Address, Config, Error, Scanner};

/// Frames received by one INSTREAM session.
type Session = Vec<Vec<u8>>;

/// Fake daemon listening on an ephemeral loopback port.
struct FakeDaemon {
    address: Address,
    sessions: Arc<Mutex<Vec<Session>>>,
}

impl FakeDaemon {
    /// Starts a daemon whose first `drop_first` connections are closed
    /// without a reply.
    fn start(drop_first: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = Address::Tcp(listener.local_addr().unwrap().to_string());
        let sessions = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::new(AtomicUsize::new(0));

        let log = Arc::clone(&sessions);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { return };
                if seen.fetch_add(1, Ordering::SeqCst) < drop_first {
                    drop(stream);
                    continue;
                }
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    let _ = serve(stream, &log);
                });
            }
        });

        Self { address, sessions }
    }

    fn config(&self) -> Config {
        let mut cfg = Config::new(self.address.clone());
        cfg.retry_interval = Duration::from_millis(20);
        cfg.ready_timeout = Duration::from_secs(5);
        cfg.io_timeout = Some(Duration::from_secs(5));
        cfg
    }

    fn sessions(&self) -> Vec<Session> {
        self.sessions.lock().unwrap().clone()
    }
}

/// Handles one connection: PING or INSTREAM.
fn serve(stream: TcpStream, log: &Mutex<Vec<Session>>) -> io::Result<()> {
    let mut w = stream.try_clone()?;
    let mut r = BufReader::new(stream);

    let mut command = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        r.read_exact(&mut byte)?;
        if byte[0] == 0 {
            break;
        }
        command.push(byte[0]);
    }

    match command.as_slice() {
        b"zPING" => w.write_all(b"PONG\0"),
        b"zINSTREAM" => {
            let mut frames = Vec::new();
            while let Some(frame) = clamwire_proto::read_frame(&mut r)? {
                frames.push(frame);
            }
            let data = frames.concat();
            log.lock().unwrap().push(frames);
            let reply = if data.windows(5).any(|w| w == b"EICAR") {
                "stream: Eicar-Test-Signature FOUND".to_owned()
            } else if data.first() == Some(&b'#') {
                format!("FOUND: len={} tag={}", data.len(), data[1])
            } else {
                "OK".to_owned()
            };
            w.write_all(reply.as_bytes())?;
            w.write_all(b"\0")
        }
        _ => w.write_all(b"UNKNOWN COMMAND\0"),
    }
}

#[test]
fn clean_and_infected_streams() {
    let daemon = FakeDaemon::start(0);
    let scanner = clamwire::connect(&daemon.config()).unwrap();

    let clean = scanner.scan_bytes(b"hello world").unwrap();
    assert!(!clean.is_flagged());
    assert_eq!(clean.diagnostic(), "");

    let infected = scanner
        .scan_bytes(b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!")
        .unwrap();
    assert!(infected.is_flagged());
    assert_eq!(infected.diagnostic(), "stream: Eicar-Test-Signature FOUND");
}

#[test]
fn framing_round_trips_over_tcp() {
    let daemon = FakeDaemon::start(0);
    let scanner = Scanner::from_config(&daemon.config());

    let sources: Vec<Vec<u8>> = [0usize, 1, 2048, 2049, 100_000]
        .iter()
        .map(|&len| (0..len).map(|i| (i % 251) as u8).collect())
        .collect();
    for data in &sources {
        scanner.scan_bytes(data).unwrap();
    }

    let sessions = daemon.sessions();
    assert_eq!(sessions.len(), sources.len());
    for (frames, data) in sessions.iter().zip(&sources) {
        assert_eq!(&frames.concat(), data);
        assert!(frames.iter().all(|f| !f.is_empty() && f.len() <= 2048));
    }
    assert!(sessions[0].is_empty());
}

#[test]
fn scans_file_from_disk() {
    let daemon = FakeDaemon::start(0);
    let scanner = Scanner::from_config(&daemon.config());

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&vec![b'z'; 10_000]).unwrap();
    file.flush().unwrap();

    assert!(!scanner.scan_path(file.path()).unwrap().is_flagged());
    assert_eq!(daemon.sessions()[0].concat(), vec![b'z'; 10_000]);
}

#[test]
fn concurrent_sessions_stay_separate() {
    let daemon = FakeDaemon::start(0);
    let scanner = Scanner::from_config(&daemon.config());

    thread::scope(|s| {
        for tag in 0..8u8 {
            let scanner = &scanner;
            s.spawn(move || {
                let len = 5_000 + usize::from(tag) * 1_000;
                let mut data = vec![tag; len];
                data[0] = b'#';
                let verdict = scanner.scan_bytes(&data).unwrap();
                assert_eq!(verdict.diagnostic(), format!("FOUND: len={len} tag={tag}"));
            });
        }
    });

    let sessions = daemon.sessions();
    assert_eq!(sessions.len(), 8);
    for frames in sessions {
        let data = frames.concat();
        let tag = data[1];
        assert!(data[1..].iter().all(|&b| b == tag));
    }
}

#[test]
fn probe_retries_until_daemon_answers() {
    let daemon = FakeDaemon::start(3);
    let ready = clamwire::Probe::from_config(&daemon.config())
        .wait_until_ready()
        .unwrap();
    assert_eq!(ready.attempts, 4);
}

#[test]
fn probe_times_out_when_nobody_listens() {
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let mut cfg = Config::new(Address::Tcp(format!("127.0.0.1:{port}")));
    cfg.ready_timeout = Duration::from_millis(200);
    cfg.retry_interval = Duration::from_millis(50);

    let start = Instant::now();
    let err = clamwire::connect(&cfg).unwrap_err();
    assert!(start.elapsed() >= Duration::from_millis(200));
    assert!(matches!(err, Error::Timeout { .. }), "{err:?}");
}

#[test]
fn refused_scan_is_a_connect_error() {
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let cfg = Config::new(Address::Tcp(format!("127.0.0.1:{port}")));
    let err = Scanner::from_config(&cfg).scan_bytes(b"data").unwrap_err();
    assert!(matches!(err, Error::Connect { .. }), "{err:?}");
}

#[cfg(unix)]
#[test]
fn unix_socket_session() {
    use std::os::unix::net::UnixListener;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clamd.sock");
    let listener = UnixListener::bind(&path).unwrap();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut cmd = [0u8; 10];
        stream.read_exact(&mut cmd).unwrap();
        assert_eq!(&cmd, b"zINSTREAM\0");
        let mut frames = Vec::new();
        while let Some(frame) = clamwire_proto::read_frame(&mut stream).unwrap() {
            frames.push(frame);
        }
        stream.write_all(b"OK\0").unwrap();
        frames.concat()
    });

    let cfg = Config::new(Address::Unix(path));
    let verdict = Scanner::from_config(&cfg).scan_bytes(b"over a unix socket").unwrap();
    assert!(!verdict.is_flagged());
    assert_eq!(server.join().unwrap(), b"over a unix socket");
}
