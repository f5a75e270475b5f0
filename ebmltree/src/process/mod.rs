/// Caller policy consulted while walking.
///
/// Provides the [`Listener`](listener::Listener) trait, the five
/// [`Action`](listener::Action)s it can return, and the
/// [`ReadAll`](listener::ReadAll) listener.
pub mod listener;

/// Container tree walking.
///
/// Provides the [`Walker`](walk::Walker) parse session, which turns a byte
/// source into a [`ParseTree`](crate::structs::tree::ParseTree) under a linked
/// [`Schema`](crate::structs::schema::Schema).
pub mod walk;

/// A minimal WebM document: EBML header, then an unknown-size segment with
/// info, one Opus track, a void element and a single cluster.
pub const EXAMPLE_DATA: &[u8] = &[
    // EBML header
    0x1A, 0x45, 0xDF, 0xA3, 0x9F, //
    0x42, 0x86, 0x81, 0x01, // version
    0x42, 0xF7, 0x81, 0x01, // read_version
    0x42, 0xF2, 0x81, 0x04, // max_id_length
    0x42, 0xF3, 0x81, 0x08, // max_size_length
    0x42, 0x82, 0x84, 0x77, 0x65, 0x62, 0x6D, // doc_type "webm"
    0x42, 0x87, 0x81, 0x04, // doc_type_version
    0x42, 0x85, 0x81, 0x02, // doc_type_read_version
    // segment, unknown size
    0x18, 0x53, 0x80, 0x67, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, //
    // info
    0x15, 0x49, 0xA9, 0x66, 0xA6, //
    0x2A, 0xD7, 0xB1, 0x83, 0x0F, 0x42, 0x40, // timecode_scale 1000000
    0x4D, 0x80, 0x84, 0x64, 0x65, 0x6D, 0x6F, // muxing_app "demo"
    0x57, 0x41, 0x84, 0x64, 0x65, 0x6D, 0x6F, // writing_app "demo"
    0x44, 0x89, 0x84, 0x44, 0x7A, 0x00, 0x00, // duration 1000.0
    0x7B, 0xA9, 0x87, 0x45, 0x78, 0x61, 0x6D, 0x70, 0x6C, 0x65, // title "Example"
    // tracks
    0x16, 0x54, 0xAE, 0x6B, 0xAA, //
    0xAE, 0xA8, // track_entry
    0xD7, 0x81, 0x01, // number
    0x73, 0xC5, 0x81, 0x01, // uid
    0x83, 0x81, 0x02, // type audio
    0x86, 0x86, 0x41, 0x5F, 0x4F, 0x50, 0x55, 0x53, // codec_id "A_OPUS"
    0x22, 0xB5, 0x9C, 0x83, 0x65, 0x6E, 0x67, // language "eng"
    0xE1, 0x8D, // audio
    0xB5, 0x88, 0x40, 0xE7, 0x70, 0x00, 0x00, 0x00, 0x00, 0x00, // sampling_frequency 48000.0
    0x9F, 0x81, 0x02, // channels
    // void
    0xEC, 0x83, 0x00, 0x00, 0x00, //
    // cluster
    0x1F, 0x43, 0xB6, 0x75, 0x89, //
    0xE7, 0x81, 0x00, // timecode
    0xA3, 0x84, 0x81, 0x00, 0x00, 0x80, // simple_block
];
