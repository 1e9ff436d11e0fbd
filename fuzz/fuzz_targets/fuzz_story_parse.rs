#![no_main]
use dialogue_tracker::narrative::{MarkdownStoryCodec, NarrativeCodec};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let codec = MarkdownStoryCodec;
        if let Ok(dialogues) = codec.parse(s) {
            for dialogue in &dialogues {
                let _ = codec.export(dialogue);
            }
        }
    }
});
