#![no_main]

use bytes::Bytes;
use certpath::x509::Certificate;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(cert) = Certificate::decode(Bytes::copy_from_slice(data)) {
        // Whatever decodes must re-encode to the exact input.
        assert_eq!(cert.to_bytes(), data);
        let _ = cert.version();
        let _ = cert.subject().to_string();
        let _ = cert.issuer().to_string();
    }
});
