// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::{TrustLedgerError, TrustLedgerResult};
use crate::hashing::{canonical_json, to_hex, GENESIS_HASH};
use crate::ledger::{ledger_violation, verify_chain, LedgerStore};

/// Ledger head commitment at a given height.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerCheckpoint {
    pub schema_version: u32,
    pub height: u64,
    pub head_hash_hex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedCheckpoint {
    pub height: u64,
    pub head_hash_hex: String,
    pub signer_public_key_hex: String,
    pub signature_hex: String,
}

impl SignedCheckpoint {
    fn unsigned(&self) -> LedgerCheckpoint {
        LedgerCheckpoint {
            schema_version: 1,
            height: self.height,
            head_hash_hex: self.head_hash_hex.clone(),
        }
    }
}

fn checkpoint_of(store: &dyn LedgerStore) -> TrustLedgerResult<LedgerCheckpoint> {
    let blocks = store.blocks()?;
    verify_chain(&blocks).map_err(ledger_violation)?;
    let (height, head) = match blocks.last() {
        Some(b) => (b.block_number, b.block_hash),
        None => (0, GENESIS_HASH),
    };
    Ok(LedgerCheckpoint {
        schema_version: 1,
        height,
        head_hash_hex: to_hex(&head),
    })
}

/// Signs the current head of an intact ledger.
pub fn sign_checkpoint(
    store: &dyn LedgerStore,
    signing_key: &SigningKey,
) -> TrustLedgerResult<SignedCheckpoint> {
    let checkpoint = checkpoint_of(store)?;
    let payload = canonical_json(&checkpoint)?;
    let signature = signing_key.sign(&payload);
    Ok(SignedCheckpoint {
        height: checkpoint.height,
        head_hash_hex: checkpoint.head_hash_hex,
        signer_public_key_hex: hex::encode(signing_key.verifying_key().to_bytes()),
        signature_hex: hex::encode(signature.to_bytes()),
    })
}

/// Checks the signature and that the ledger still carries the signed head at
/// the signed height. Blocks appended since do not invalidate it.
pub fn verify_checkpoint(
    record: &SignedCheckpoint,
    expected_verifying_key: &VerifyingKey,
    store: &dyn LedgerStore,
) -> TrustLedgerResult<()> {
    if hex::encode(expected_verifying_key.to_bytes()) != record.signer_public_key_hex {
        return Err(TrustLedgerError::InvalidArgument(
            "unexpected signer key".to_string(),
        ));
    }
    let sig_bytes = hex::decode(&record.signature_hex)
        .map_err(|_| TrustLedgerError::InvalidArgument("invalid signature hex".to_string()))?;
    let sig = Signature::from_slice(&sig_bytes)
        .map_err(|_| TrustLedgerError::InvalidArgument("invalid signature bytes".to_string()))?;
    let payload = canonical_json(&record.unsigned())?;
    expected_verifying_key
        .verify(&payload, &sig)
        .map_err(|_| {
            TrustLedgerError::InvalidArgument("signature verification failed".to_string())
        })?;

    let blocks = store.blocks()?;
    verify_chain(&blocks).map_err(ledger_violation)?;
    let head_at_height = if record.height == 0 {
        Some(to_hex(&GENESIS_HASH))
    } else {
        store.get(record.height)?.map(|b| to_hex(&b.block_hash))
    };
    match head_at_height {
        Some(h) if h == record.head_hash_hex => Ok(()),
        Some(_) => Err(ledger_violation(
            usize::try_from(record.height.saturating_sub(1)).unwrap_or(usize::MAX),
        )),
        None => Err(TrustLedgerError::NotFound(format!(
            "block {}",
            record.height
        ))),
    }
}
