#![no_main]

use echohub_core::HubUrl;
use echohub_schema::{ApiEnvelope, ConnectInfo, Echo, EchoPage, HubDisplay};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<ApiEnvelope<ConnectInfo>>(data);
    let Ok(envelope) = serde_json::from_slice::<ApiEnvelope<EchoPage>>(data) else {
        return;
    };
    let Some(page) = envelope.data else {
        return;
    };
    let Ok(hub) = HubUrl::parse("https://fuzz.example") else {
        return;
    };
    let display = HubDisplay::resolve(None, "Ech0", "/Ech0.svg");
    for raw in page.items {
        let _ = Echo::from_raw(raw, &hub, &display);
    }
});
