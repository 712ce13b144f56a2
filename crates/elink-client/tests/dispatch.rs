mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use elink_client::{CallbackToken, Client};
use elink_frame::{escape, unescape, OutboundPacket, END, START, VALUE_RESPONSE};
use proptest::prelude::*;
use support::{callback, value, FakeCompanion};

const SHORT: Duration = Duration::from_millis(20);
const LONG: Duration = Duration::from_millis(500);

fn recorder() -> (Arc<Mutex<Vec<String>>>, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    (Arc::clone(&log), log)
}

#[test]
fn call_returns_value_and_arguments() {
    let companion = FakeCompanion::with_handler(|request| {
        assert_eq!(request.command(), 20);
        vec![value(42).with_argument(&b"ok"[..])]
    });
    let mut client = Client::new(companion);

    let reply = client.call(20, &[b"ping"], LONG).unwrap().unwrap();
    assert_eq!(reply.value, 42);
    assert_eq!(reply.argc, 1);
    assert_eq!(reply.response().pop_slice(), Some(&b"ok"[..]));

    let request = &client.port().requests[0];
    assert_eq!(request.correlation(), 0);
    assert_eq!(request.response().pop_slice(), Some(&b"ping"[..]));
}

#[test]
fn unbounded_timeout_waits_without_a_deadline() {
    let mut client = Client::new(FakeCompanion::silent());
    client.port_mut().inject_packet(&value(11));
    let reply = client.wait_for_reply(Duration::MAX).unwrap().unwrap();
    assert_eq!(reply.value, 11);
    assert!(!client.is_waiting());
}

#[test]
fn callback_response_never_completes_a_wait() {
    let mut client = Client::new(FakeCompanion::silent());
    let (seen, log) = recorder();
    let token = client.register_callback(move |_, response| {
        log.lock().unwrap().push(response.pop_string().unwrap_or_default());
    });

    client
        .port_mut()
        .inject_packet(&callback(token.get(), &[b"async"]));
    let reply = client.wait_for_reply(SHORT).unwrap();

    assert!(reply.is_none());
    assert_eq!(*seen.lock().unwrap(), vec!["async".to_string()]);
    assert_eq!(client.stats().callbacks, 1);
    assert_eq!(client.stats().values, 0);
}

#[test]
fn value_and_callback_race_are_routed_separately() {
    let companion = FakeCompanion::with_handler(|request| match request.command() {
        // Subscribe: answer through the callback, then ack by value.
        30 => vec![
            callback(request.correlation(), &[b"event"]),
            value(1),
        ],
        _ => Vec::new(),
    });
    let mut client = Client::new(companion);
    let (seen, log) = recorder();
    let token = client.register_callback(move |_, response| {
        log.lock().unwrap().push(response.pop_string().unwrap_or_default());
    });

    client.send(30, token.get(), &[]).unwrap();
    let reply = client.wait_for_reply(LONG).unwrap().unwrap();

    assert_eq!(reply.value, 1);
    assert_eq!(*seen.lock().unwrap(), vec!["event".to_string()]);
}

#[test]
fn callback_can_issue_a_blocking_call() {
    let companion = FakeCompanion::with_handler(|request| match request.command() {
        40 => vec![value(request.response().pop_u32().unwrap_or(0) * 2)],
        _ => Vec::new(),
    });
    let mut client = Client::new(companion);
    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&results);
    let token = client.register_callback(move |client, response| {
        let input = response.pop_u32().unwrap_or(0);
        let reply = client
            .call(40, &[&input.to_le_bytes()], LONG)
            .unwrap()
            .map(|reply| reply.value);
        sink.lock().unwrap().push(reply);
    });

    client
        .port_mut()
        .inject_packet(&callback(token.get(), &[]).with_argument(21u32.to_le_bytes().to_vec()));
    // The nested call's value is counted by the inner drain.
    assert_eq!(client.drain_incoming().unwrap(), 1);
    assert_eq!(client.stats().dispatched, 2);
    assert_eq!(*results.lock().unwrap(), vec![Some(42)]);
}

#[test]
fn nested_drain_consumes_bytes_in_arrival_order() {
    let mut client = Client::new(FakeCompanion::silent());
    let (order, first_log) = recorder();
    let second_log = Arc::clone(&order);

    let second = client.register_callback(move |_, _| {
        second_log.lock().unwrap().push("second".into());
    });
    let first = client.register_callback(move |client, _| {
        first_log.lock().unwrap().push("first".into());
        // Pulls in the frames queued behind this one.
        client.drain_incoming().unwrap();
        first_log.lock().unwrap().push("first done".into());
    });

    client.port_mut().inject_packet(&callback(first.get(), &[]));
    client.port_mut().inject_packet(&callback(second.get(), &[]));
    client.port_mut().inject_packet(&callback(second.get(), &[]));

    let outer = client.drain_incoming().unwrap();
    assert_eq!(outer, 1);
    assert_eq!(
        *order.lock().unwrap(),
        vec!["first", "second", "second", "first done"]
    );
    assert_eq!(client.stats().callbacks, 3);
    assert_eq!(client.port().pending(), 0);
}

#[test]
fn callback_is_not_reentered_for_its_own_token() {
    let mut client = Client::new(FakeCompanion::silent());
    let calls = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&calls);
    let token = client.register_callback(move |client, _| {
        *counter.lock().unwrap() += 1;
        client.drain_incoming().unwrap();
    });

    client.port_mut().inject_packet(&callback(token.get(), &[]));
    client.port_mut().inject_packet(&callback(token.get(), &[]));
    client.drain_incoming().unwrap();

    assert_eq!(*calls.lock().unwrap(), 1);
    assert_eq!(client.stats().orphan_callbacks, 1);
    assert!(client.is_registered(token));
}

#[test]
fn reply_survives_noise_and_truncated_frames() {
    let mut client = Client::new(FakeCompanion::silent());
    let port = client.port_mut();
    port.inject(b"wifi: connected\n");
    // Truncated frame, abandoned by the next START.
    port.inject(&[START, 0x02, 0x00, 0x00]);
    let mut corrupt = value(9).to_wire().unwrap().to_vec();
    corrupt[5] ^= 0x10;
    port.inject(&corrupt);
    port.inject(&[END, END]);
    port.inject_packet(&value(0xBEEF));

    let reply = client.wait_for_reply(LONG).unwrap().unwrap();
    assert_eq!(reply.value, 0xBEEF);
    let stats = client.stats();
    assert_eq!(stats.text_lines, 1);
    assert_eq!(stats.checksum_failures, 1);
    assert_eq!(stats.values, 1);
}

#[test]
fn unsolicited_value_does_not_leak_into_next_wait() {
    let companion = FakeCompanion::with_handler(|_| vec![value(2)]);
    let mut client = Client::new(companion);
    client.port_mut().inject_packet(&value(1));
    client.drain_incoming().unwrap();
    assert_eq!(client.stats().unsolicited_values, 1);

    let reply = client.call(50, &[], LONG).unwrap().unwrap();
    assert_eq!(reply.value, 2);
}

#[test]
fn byte_at_a_time_reads() {
    let mut companion = FakeCompanion::with_handler(|_| {
        vec![value(7).with_argument(vec![0x7Eu8, 0x7D, 0x7F, 0x00, 0x55])]
    });
    companion.read_limit = 1;
    let mut client = Client::new(companion);

    let reply = client.call(60, &[], LONG).unwrap().unwrap();
    assert_eq!(reply.value, 7);
    assert_eq!(
        reply.response().pop_slice(),
        Some(&[0x7Eu8, 0x7D, 0x7F, 0x00, 0x55][..])
    );
}

#[test]
fn unregistered_token_is_dropped() {
    let mut client = Client::new(FakeCompanion::silent());
    let token = client.register_callback(|_, _| panic!("must not run"));
    assert!(client.unregister_callback(token));
    client.port_mut().inject_packet(&callback(token.get(), &[]));
    assert_eq!(client.drain_incoming().unwrap(), 0);
    assert_eq!(client.stats().orphan_callbacks, 1);
}

#[test]
fn replacing_a_callback_from_inside_it() {
    let mut client = Client::new(FakeCompanion::silent());
    let (seen, log) = recorder();
    let token = CallbackToken::new(0x55).unwrap();
    client.register_callback_at(token, move |client, _| {
        log.lock().unwrap().push("original".into());
        let log = Arc::clone(&log);
        client.register_callback_at(token, move |_, _| {
            log.lock().unwrap().push("replacement".into());
        });
    });

    client.port_mut().inject_packet(&callback(token.get(), &[]));
    client.port_mut().inject_packet(&callback(token.get(), &[]));
    client.drain_incoming().unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["original", "replacement"]);
}

#[test]
fn requests_are_written_whole() {
    let mut client = Client::new(FakeCompanion::silent());
    client.send(70, 0, &[b"a"]).unwrap();
    let mut request = client.open_request(71, 5, 2).unwrap();
    request.arg(b"bc").unwrap();
    request.arg_staged(3, b"def".iter().copied()).unwrap();
    request.finish().unwrap();

    let requests = &client.port().requests;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].command(), 71);
    assert_eq!(requests[1].correlation(), 5);
    let mut args = requests[1].response();
    assert_eq!(args.pop_slice(), Some(&b"bc"[..]));
    assert_eq!(args.pop_slice(), Some(&b"def"[..]));
}

fn arb_value_reply() -> impl Strategy<Value = OutboundPacket> {
    (
        any::<u32>(),
        proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..24), 0..4),
    )
        .prop_map(|(value, args)| {
            args.into_iter()
                .fold(OutboundPacket::new(VALUE_RESPONSE, value), |packet, arg| {
                    packet.with_argument(arg)
                })
        })
}

proptest! {
    #[test]
    fn truncated_replies_are_never_delivered(
        reply in arb_value_reply(),
        cut in any::<prop::sample::Index>(),
    ) {
        let wire = reply.to_wire().unwrap();
        let frame = unescape(&wire[1..wire.len() - 1]);
        let mut truncated = vec![START];
        truncated.extend(escape(&frame[..cut.index(frame.len())]));
        truncated.push(END);

        let mut client = Client::new(FakeCompanion::silent());
        client.port_mut().inject(&truncated);
        prop_assert!(client.wait_for_reply(Duration::ZERO).unwrap().is_none());
        prop_assert_eq!(client.stats().dispatched, 0);
        prop_assert_eq!(client.port().pending(), 0);
    }
}

#[cfg(unix)]
#[test]
fn works_over_a_unix_socket_pair() {
    use elink_transport::{ByteSink, StreamPort};

    let (ours, mut theirs) = StreamPort::unix_pair().unwrap();
    let mut client = Client::new(ours);
    theirs
        .write_bytes(&value(0x1234).to_wire().unwrap())
        .unwrap();
    let reply = client.wait_for_reply(LONG).unwrap().unwrap();
    assert_eq!(reply.value, 0x1234);
}
