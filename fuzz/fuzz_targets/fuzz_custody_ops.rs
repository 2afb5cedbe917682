#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use chrono::{Duration, TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use trustledger_core::custody::{CustodyAction, CustodyChain};
use trustledger_core::error::TrustLedgerError;

#[derive(Debug, Arbitrary)]
enum Op {
    Append {
        action: u8,
        actor: String,
        offset_secs: i32,
    },
    Seal,
}

fn action(tag: u8) -> CustodyAction {
    match tag % 4 {
        0 => CustodyAction::Uploaded,
        1 => CustodyAction::Transferred,
        2 => CustodyAction::Verified,
        _ => CustodyAction::Analyzed,
    }
}

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let Ok(ops) = Vec::<Op>::arbitrary(&mut u) else {
        return;
    };
    let base = Utc
        .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .expect("fixed instant");

    let mut chain = CustodyChain::new();
    for op in ops {
        match op {
            Op::Append {
                action: tag,
                actor,
                offset_secs,
            } => {
                let before = chain.len();
                let ts = base + Duration::seconds(i64::from(offset_secs));
                match chain.append(action(tag), &actor, ts) {
                    Ok(_) => assert_eq!(chain.len(), before + 1),
                    Err(TrustLedgerError::ArtifactSealed) => assert!(chain.is_sealed()),
                    Err(TrustLedgerError::NonMonotonicTimestamp)
                    | Err(TrustLedgerError::InvalidArgument(_)) => {
                        assert_eq!(chain.len(), before)
                    }
                    Err(other) => panic!("unexpected custody error: {other:?}"),
                }
            }
            Op::Seal => chain.seal(),
        }
        assert!(chain.verify().is_ok(), "appends must keep the chain intact");
    }
});
