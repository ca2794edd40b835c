use bytes::BufMut;
use cubicle_protocol::upload::{FLAG_FIRST, FLAG_LAST, MAX_FILES, MAX_FILE_NAME, MAX_PACKET_SIZE};
use cubicle_protocol::wire::write_var_int;
use cubicle_protocol::{
    FileUpload, ProtocolError, UploadError, UploadFileMessage, UploadLimits, UploadReceiver,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

const UNICODE: &[char] = &['é', 'ß', 'λ', 'ж', '日', '本', '☃', '🎉'];

fn random_name(rng: &mut StdRng) -> String {
    if rng.gen_bool(0.5) {
        let length = rng.gen_range(1..=MAX_FILE_NAME);
        (0..length).map(|_| rng.gen_range(b' '..=b'~') as char).collect()
    } else {
        let length = rng.gen_range(1..=MAX_FILE_NAME / 4);
        (0..length).map(|_| UNICODE[rng.gen_range(0..UNICODE.len())]).collect()
    }
}

fn random_files(rng: &mut StdRng, limits: &UploadLimits) -> Vec<FileUpload> {
    let count = rng.gen_range(1..=MAX_FILES);
    let share = limits.max_size / count;
    (0..count)
        .map(|_| {
            let mut contents = vec![0; rng.gen_range(0..=share)];
            rng.fill(&mut contents[..]);
            FileUpload::new(random_name(rng), contents)
        })
        .collect()
}

/// Send packets over the wire, checking each one's size.
fn round_trip(packets: &[UploadFileMessage], limits: &UploadLimits) -> Vec<UploadFileMessage> {
    packets
        .iter()
        .map(|packet| {
            let mut wire = Vec::new();
            packet.encode(&mut wire).unwrap();
            assert!(wire.len() <= MAX_PACKET_SIZE + 128, "Packet is too large");
            if !packet.is_last() {
                assert!(
                    wire.len() >= MAX_PACKET_SIZE - MAX_FILE_NAME * MAX_FILES,
                    "Non-final packets should be efficiently packed"
                );
            }

            let mut input = &wire[..];
            let decoded = UploadFileMessage::decode(&mut input, limits).unwrap();
            assert!(input.is_empty());
            decoded
        })
        .collect()
}

fn receive(packets: Vec<UploadFileMessage>) -> Vec<FileUpload> {
    let count = packets.len();
    let mut receiver = UploadReceiver::new();
    let mut received = None;
    for (i, packet) in packets.into_iter().enumerate() {
        assert_eq!(i == 0, packet.flag & FLAG_FIRST != 0, "FLAG_FIRST");
        assert_eq!(i == count - 1, packet.flag & FLAG_LAST != 0, "FLAG_LAST");
        received = receiver.receive(packet).unwrap();
        assert_eq!(received.is_some(), i == count - 1);
    }
    received.unwrap()
}

#[test]
fn random_uploads_are_reassembled() {
    let limits = UploadLimits::default();
    let mut rng = StdRng::seed_from_u64(20_221_104);
    for _ in 0..50 {
        let files = random_files(&mut rng, &limits);
        let packets = UploadFileMessage::split(Uuid::new_v4(), &files).unwrap();
        let received = receive(round_trip(&packets, &limits));
        assert_eq!(received, files);
        assert!(received.iter().all(FileUpload::checksum_matches));
    }
}

#[test]
fn large_file_spans_packets() {
    let contents: Vec<u8> = (0..100 * 1024).map(|i| (i % 251) as u8).collect();
    let files = vec![FileUpload::new("big.bin", contents.clone())];
    let packets = UploadFileMessage::split(Uuid::new_v4(), &files).unwrap();

    assert_eq!(packets.len(), 4);
    assert_eq!(packets[0].flag, FLAG_FIRST);
    assert_eq!(packets[1].flag, 0);
    assert_eq!(packets[3].flag, FLAG_LAST);
    assert!(packets[1..].iter().all(|p| p.files.is_empty()));

    let received = receive(round_trip(&packets, &UploadLimits::default()));
    assert_eq!(received[0].contents(), &contents[..]);
}

#[test]
fn empty_upload_is_refused() {
    let packets = UploadFileMessage::split(Uuid::new_v4(), &[]).unwrap();
    assert_eq!(packets.len(), 1);
    let mut receiver = UploadReceiver::new();
    assert_eq!(
        receiver.receive(packets[0].clone()),
        Err(UploadError::NoFiles)
    );
}

#[test]
fn too_many_files_cannot_be_split() {
    let files = vec![FileUpload::new("x", Vec::new()); MAX_FILES + 1];
    assert!(matches!(
        UploadFileMessage::split(Uuid::new_v4(), &files),
        Err(ProtocolError::TooManyFiles { count: 33, max: 32 })
    ));
}

fn first_packet(files: Vec<FileUpload>) -> Vec<u8> {
    let message = UploadFileMessage {
        id: Uuid::new_v4(),
        flag: FLAG_FIRST,
        files,
        slices: Vec::new(),
    };
    let mut wire = Vec::new();
    message.encode(&mut wire).unwrap();
    wire
}

#[test]
fn decode_enforces_limits() {
    let limits = UploadLimits {
        max_size: 1000,
        max_files: 2,
    };

    let three = first_packet(vec![FileUpload::new("a", Vec::new()); 3]);
    assert!(matches!(
        UploadFileMessage::decode(&mut &three[..], &limits),
        Err(ProtocolError::TooManyFiles { count: 3, max: 2 })
    ));

    let huge = first_packet(vec![FileUpload::new("a", vec![0; 1001])]);
    assert!(matches!(
        UploadFileMessage::decode(&mut &huge[..], &limits),
        Err(ProtocolError::FilesTooLarge)
    ));

    let total = first_packet(vec![FileUpload::new("a", vec![0; 600]); 2]);
    assert!(matches!(
        UploadFileMessage::decode(&mut &total[..], &limits),
        Err(ProtocolError::FilesTooLarge)
    ));

    let fine = first_packet(vec![FileUpload::new("a", vec![0; 500]); 2]);
    let decoded = UploadFileMessage::decode(&mut &fine[..], &limits).unwrap();
    assert_eq!(decoded.files.len(), 2);
    assert!(decoded.files.iter().all(|f| f.len() == 500));
}

#[test]
fn oversized_slices_are_rejected() {
    let mut wire = Vec::new();
    wire.put_slice(Uuid::new_v4().as_bytes());
    wire.put_u8(0);
    write_var_int(&mut wire, 1);
    wire.put_u8(0);
    write_var_int(&mut wire, 0);
    wire.put_u16(31 * 1024);
    assert!(matches!(
        UploadFileMessage::decode(&mut &wire[..], &UploadLimits::default()),
        Err(ProtocolError::SliceTooLarge(_))
    ));
}

#[test]
fn truncated_packets_are_rejected() {
    let wire = first_packet(vec![FileUpload::new("hello.lua", b"print('hi')".to_vec())]);
    for end in [0, 10, 17, wire.len() - 1] {
        assert!(
            matches!(
                UploadFileMessage::decode(&mut &wire[..end], &UploadLimits::default()),
                Err(ProtocolError::Truncated { .. })
            ),
            "decoding {end} bytes"
        );
    }
}

fn two_part_upload() -> Vec<UploadFileMessage> {
    let contents = vec![7; 40 * 1024];
    let packets = UploadFileMessage::split(Uuid::new_v4(), &[FileUpload::new("a", contents)]).unwrap();
    assert_eq!(packets.len(), 2);
    packets
}

#[test]
fn packets_for_another_upload_are_skipped() {
    let ours = two_part_upload();
    let theirs = two_part_upload();

    let mut receiver = UploadReceiver::new();
    assert_eq!(receiver.receive(ours[0].clone()), Ok(None));
    assert!(matches!(
        receiver.receive(theirs[1].clone()),
        Err(UploadError::WrongUpload { .. })
    ));
    assert_eq!(receiver.in_progress(), Some(ours[0].id), "Our upload survives");

    let files = receiver.receive(ours[1].clone()).unwrap().unwrap();
    assert!(files[0].checksum_matches());
}

#[test]
fn packets_before_the_first_are_skipped() {
    let packets = two_part_upload();
    let mut receiver = UploadReceiver::new();
    assert_eq!(receiver.receive(packets[1].clone()), Err(UploadError::NotStarted));
}

#[test]
fn new_upload_replaces_the_old() {
    let old = two_part_upload();
    let new = two_part_upload();

    let mut receiver = UploadReceiver::new();
    receiver.receive(old[0].clone()).unwrap();
    receiver.receive(new[0].clone()).unwrap();
    assert_eq!(receiver.in_progress(), Some(new[0].id));
    assert!(receiver.receive(new[1].clone()).unwrap().is_some());
}

#[test]
fn out_of_bounds_slice_abandons_upload() {
    let mut packets = two_part_upload();
    packets[1].slices[0].offset = 40 * 1024;

    let mut receiver = UploadReceiver::new();
    receiver.receive(packets[0].clone()).unwrap();
    assert!(matches!(
        receiver.receive(packets[1].clone()),
        Err(UploadError::InvalidSlice { file_id: 0, .. })
    ));
    assert_eq!(receiver.in_progress(), None);
}
