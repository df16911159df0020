//! End-to-end scenarios through the dispatcher: cooked answers, ANY
//! expansion, and proxying against stub upstreams on the loopback.

use dnscook::{Action, Dispatcher, RuleTable, Type, Upstream, WILDCARD};
use pretty_assertions::assert_eq;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

fn client() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

fn cook(spec: &str) -> Action {
    Action::Cook(spec.to_string())
}

/// A hand-built standard query: id 0x1234, RD set, one question.
fn query(name: &str, qtype: u16) -> Vec<u8> {
    let mut buf = vec![0x12, 0x34, 0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0];
    for label in name.split('.') {
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0);
    buf.extend_from_slice(&qtype.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf
}

fn skip_name(buf: &[u8], mut pos: usize) -> usize {
    loop {
        let len = buf[pos] as usize;
        if len == 0 {
            return pos + 1;
        }
        if len & 0xC0 == 0xC0 {
            return pos + 2;
        }
        pos += 1 + len;
    }
}

/// Walks the answer section, returning each answer's (type, rdata).
fn answers(resp: &[u8]) -> Vec<(u16, Vec<u8>)> {
    let an_count = u16::from_be_bytes([resp[6], resp[7]]) as usize;
    let mut pos = skip_name(resp, 12) + 4; // question

    let mut out = Vec::new();
    for _ in 0..an_count {
        pos = skip_name(resp, pos);
        let r#type = u16::from_be_bytes([resp[pos], resp[pos + 1]]);
        let rdlen = u16::from_be_bytes([resp[pos + 8], resp[pos + 9]]) as usize;
        out.push((r#type, resp[pos + 10..pos + 10 + rdlen].to_vec()));
        pos += 10 + rdlen;
    }
    out
}

/// A one-shot UDP upstream on the loopback that answers every request with
/// `reply`, whatever was asked.
async fn stub_udp_upstream(reply: &'static [u8]) -> Upstream {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let upstream = format!("127.0.0.1#{}", socket.local_addr().unwrap().port());

    tokio::spawn(async move {
        let mut buf = vec![0; 65535];
        let (_, peer) = socket.recv_from(&mut buf).await.unwrap();
        socket.send_to(reply, peer).await.unwrap();
    });

    upstream.parse().unwrap()
}

/// Like [`stub_udp_upstream`], speaking the length-prefixed TCP framing.
async fn stub_tcp_upstream(reply: &'static [u8]) -> Upstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = format!("127.0.0.1#{}#tcp", listener.local_addr().unwrap().port());

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut len = [0; 2];
        stream.read_exact(&mut len).await.unwrap();
        let mut request = vec![0; u16::from_be_bytes(len).into()];
        stream.read_exact(&mut request).await.unwrap();

        stream
            .write_all(&(reply.len() as u16).to_be_bytes())
            .await
            .unwrap();
        stream.write_all(reply).await.unwrap();
    });

    upstream.parse().unwrap()
}

#[tokio::test]
async fn cooked_a_record_for_a_fakedomain() {
    let mut rules = RuleTable::new();
    rules.insert(Type::A, "example.com", cook("192.0.2.1"));
    let dispatcher = Dispatcher::new(rules, Vec::new(), false);

    let resp = dispatcher
        .dispatch(&query("example.com", 1), client())
        .await
        .expect("expected a cooked response");

    // id echoed; QR, AA and RA set; RD carried over; NOERROR.
    assert_eq!(&resp[0..2], &[0x12, 0x34]);
    assert_eq!(resp[2] & 0x80, 0x80);
    assert_eq!(resp[2] & 0x04, 0x04);
    assert_eq!(resp[2] & 0x01, 0x01);
    assert_eq!(resp[3], 0x80);

    assert_eq!(answers(&resp), vec![(1, vec![192, 0, 2, 1])]);
}

#[tokio::test]
async fn matching_is_case_insensitive_and_the_echo_is_not() {
    let mut rules = RuleTable::new();
    rules.insert(Type::A, "example.com", cook("192.0.2.1"));
    let dispatcher = Dispatcher::new(rules, Vec::new(), false);

    let resp = dispatcher
        .dispatch(&query("Example.COM", 1), client())
        .await
        .expect("expected a cooked response");

    assert_eq!(answers(&resp).len(), 1);

    // The question section preserves the case the client used.
    assert_eq!(&resp[12..25], b"\x07Example\x03COM\x00");
}

#[tokio::test]
async fn unmatched_query_is_proxied_verbatim() {
    static REPLY: &[u8] = b"pretend this is a DNS answer";

    let mut rules = RuleTable::new();
    rules.insert(Type::A, "example.com", cook("192.0.2.1"));
    let upstream = stub_udp_upstream(REPLY).await;
    let dispatcher = Dispatcher::new(rules, vec![upstream], false);

    let resp = dispatcher
        .dispatch(&query("other.test", 1), client())
        .await
        .expect("expected the upstream's reply");

    // Byte-for-byte what the upstream sent.
    assert_eq!(resp, REPLY);
}

#[tokio::test]
async fn truedomain_is_forwarded_and_the_rest_cooked() {
    static REPLY: &[u8] = b"the one true answer";

    let mut rules = RuleTable::new();
    rules.insert(Type::A, "example.com", Action::Forward);
    rules.insert(Type::A, WILDCARD, cook("192.0.2.1"));
    let upstream = stub_udp_upstream(REPLY).await;
    let dispatcher = Dispatcher::new(rules, vec![upstream], false);

    // The negative marker sends the listed domain upstream.
    let resp = dispatcher
        .dispatch(&query("example.com", 1), client())
        .await
        .unwrap();
    assert_eq!(resp, REPLY);

    // Everything else hits the universal pattern.
    let resp = dispatcher
        .dispatch(&query("foo.bar", 1), client())
        .await
        .unwrap();
    assert_eq!(answers(&resp), vec![(1, vec![192, 0, 2, 1])]);
}

#[tokio::test]
async fn any_query_expands_every_cooked_type_in_table_order() {
    let mut rules = RuleTable::new();
    rules.insert(Type::A, WILDCARD, cook("192.0.2.1"));
    rules.insert(Type::AAAA, WILDCARD, cook("2001:db8::1"));
    rules.insert(Type::MX, WILDCARD, cook("mx.fake"));
    let dispatcher = Dispatcher::new(rules, Vec::new(), false);

    let resp = dispatcher
        .dispatch(&query("anything.test", 255), client())
        .await
        .expect("expected a cooked ANY response");

    let answers = answers(&resp);
    let types: Vec<u16> = answers.iter().map(|(t, _)| *t).collect();
    assert_eq!(types, vec![1, 15, 28]);

    assert_eq!(answers[0].1, vec![192, 0, 2, 1]);
    assert_eq!(answers[1].1, b"\x00\x0a\x02mx\x04fake\x00".to_vec());
    assert_eq!(
        answers[2].1,
        vec![0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]
    );
}

#[tokio::test]
async fn any_query_with_a_missing_type_goes_upstream() {
    static REPLY: &[u8] = b"upstream knows best";

    let mut rules = RuleTable::new();
    rules.insert(Type::A, WILDCARD, cook("192.0.2.1"));
    rules.insert(Type::TXT, "only.example.com", cook("hello"));
    let upstream = stub_udp_upstream(REPLY).await;
    let dispatcher = Dispatcher::new(rules, vec![upstream], false);

    // The TXT sub-map has no match for this name, so nothing is cooked.
    let resp = dispatcher
        .dispatch(&query("other.test", 255), client())
        .await
        .unwrap();
    assert_eq!(resp, REPLY);
}

#[tokio::test]
async fn srv_rule_from_the_file_grammar() {
    let mut rules = RuleTable::new();
    rules.insert(
        Type::SRV,
        "_sip._tcp.example.com",
        cook("10 20 5060 sip.fake.com"),
    );
    let dispatcher = Dispatcher::new(rules, Vec::new(), false);

    let resp = dispatcher
        .dispatch(&query("_sip._tcp.example.com", 33), client())
        .await
        .unwrap();

    assert_eq!(
        answers(&resp),
        vec![(33, b"\x00\x0a\x00\x14\x13\xc4\x03sip\x04fake\x03com\x00".to_vec())]
    );
}

#[tokio::test]
async fn soa_rule_strips_trailing_dots() {
    let mut rules = RuleTable::new();
    rules.insert(
        Type::SOA,
        "example.com",
        cook("ns1.fake. hostmaster.fake. 1 2 3 4 5"),
    );
    let dispatcher = Dispatcher::new(rules, Vec::new(), false);

    let resp = dispatcher
        .dispatch(&query("example.com", 6), client())
        .await
        .unwrap();

    let answers = answers(&resp);
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].0, 6);

    let rdata = &answers[0].1;
    assert!(rdata.starts_with(b"\x03ns1\x04fake\x00\x0ahostmaster\x04fake\x00"));
    assert_eq!(
        &rdata[rdata.len() - 20..],
        &[0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0, 5]
    );
}

#[tokio::test]
async fn tcp_upstream_framing_is_stripped() {
    static REPLY: &[u8] = b"framed reply";

    let upstream = stub_tcp_upstream(REPLY).await;
    let dispatcher = Dispatcher::new(RuleTable::new(), vec![upstream], false);

    let resp = dispatcher
        .dispatch(&query("example.com", 1), client())
        .await
        .unwrap();

    // The 2-byte length prefix never reaches the client.
    assert_eq!(resp, REPLY);
}

#[tokio::test]
async fn malformed_request_is_dropped() {
    let dispatcher = Dispatcher::new(RuleTable::new(), Vec::new(), false);

    assert_eq!(dispatcher.dispatch(&[0xFF, 0x00], client()).await, None);
}

#[tokio::test]
async fn responses_are_not_answered() {
    let mut rules = RuleTable::new();
    rules.insert(Type::A, WILDCARD, cook("192.0.2.1"));
    let dispatcher = Dispatcher::new(rules, Vec::new(), false);

    let mut buf = query("example.com", 1);
    buf[2] |= 0x80; // QR = response

    assert_eq!(dispatcher.dispatch(&buf, client()).await, None);
}

#[tokio::test]
async fn unparseable_spec_drops_the_query() {
    let mut rules = RuleTable::new();
    rules.insert(Type::A, WILDCARD, cook("not-an-ip"));
    let dispatcher = Dispatcher::new(rules, Vec::new(), false);

    assert_eq!(
        dispatcher.dispatch(&query("example.com", 1), client()).await,
        None
    );
}

#[tokio::test]
async fn unknown_qtype_is_proxied() {
    static REPLY: &[u8] = b"https record, probably";

    let mut rules = RuleTable::new();
    rules.insert(Type::A, WILDCARD, cook("192.0.2.1"));
    let upstream = stub_udp_upstream(REPLY).await;
    let dispatcher = Dispatcher::new(rules, vec![upstream], false);

    // Type 65 (HTTPS) is nothing we can cook.
    let resp = dispatcher
        .dispatch(&query("example.com", 65), client())
        .await
        .unwrap();
    assert_eq!(resp, REPLY);
}
