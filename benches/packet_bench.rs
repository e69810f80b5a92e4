use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use gamespy_login::core::codec::PacketCodec;
use gamespy_login::core::packet::Packet;
use gamespy_login::protocol::handshake::{HandshakeState, ServerHandshake};
use gamespy_login::protocol::registry::PlayerRegistry;
use tokio_util::codec::{Decoder, Encoder};

fn login_packet() -> Packet {
    let mut packet = Packet::new();
    packet.add("login", "");
    packet.add("challenge", "YJk5UFExKBwn0PEpOpinWHsRCDcfejyJ");
    packet.add("uniquenick", "some-nick");
    packet.add("response", "131def0e93e67e3e62b39d74d6316511");
    packet.add("port", "2475");
    packet.add("productid", "10439");
    packet.add("gamename", "battlefield2");
    packet.add("namespaceid", "12");
    packet.add("sdkrevision", "3");
    packet.add("id", "1");
    packet
}

#[allow(clippy::unwrap_used)]
fn bench_packet_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_encode_decode");
    let pair_counts = [1usize, 10, 40];

    for &pairs in &pair_counts {
        let mut packet = Packet::new();
        for i in 0..pairs {
            packet.add(&format!("key{i}"), format!("value{i}"));
        }
        let encoded = packet.to_bytes();
        group.throughput(Throughput::Bytes(encoded.len() as u64));

        group.bench_function(format!("encode_{pairs}_pairs"), |b| {
            b.iter_batched(
                || packet.clone(),
                |p| {
                    let mut buf = BytesMut::with_capacity(encoded.len());
                    let mut codec = PacketCodec::with_max_frame_len(64 * 1024);
                    codec.encode(p, &mut buf).unwrap();
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("decode_{pairs}_pairs"), |b| {
            b.iter_batched(
                || BytesMut::from(&encoded[..]),
                |mut buf| {
                    let mut codec = PacketCodec::with_max_frame_len(64 * 1024);
                    codec.decode(&mut buf).unwrap().unwrap();
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_process_login(c: &mut Criterion) {
    let raw = login_packet().to_bytes();
    let registry = PlayerRegistry::new();

    c.bench_function("process_login", |b| {
        b.iter_batched(
            || {
                let mut handshake = ServerHandshake::with_challenge("4Jp6A4kK02");
                handshake.advance(HandshakeState::ChallengeSent).unwrap();
                handshake.advance(HandshakeState::AwaitingLoginRead).unwrap();
                handshake
            },
            |mut handshake| handshake.process_login(&raw, &registry).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_packet_encode_decode, bench_process_login);
criterion_main!(benches);
