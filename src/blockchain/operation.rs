//! Network operations and their payload contracts.
//!
//! An operation travels as `[variant_id, payload]`. The payload schema is
//! fixed by the network; this module only knows each operation's required
//! top-level fields and rejects payloads that miss any of them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::blockchain::memo::Memo;
use crate::crypto::elgamal::ElGamalKeyPair;
use crate::error::{DcoreError, DcoreResult};

/// Asset the network's own fees are denominated in.
pub const CORE_ASSET_ID: &str = "1.3.0";

/// An amount of some asset, as the node expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAmount {
    pub amount: i64,
    pub asset_id: String,
}

impl AssetAmount {
    pub fn new(amount: i64, asset_id: impl Into<String>) -> Self {
        Self {
            amount,
            asset_id: asset_id.into(),
        }
    }

    pub fn zero(asset_id: impl Into<String>) -> Self {
        Self::new(0, asset_id)
    }
}

/// Operation variants this client can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Transfer,
    AccountCreate,
    AccountUpdate,
    AssetCreate,
    IssueAsset,
    AssetPublishFeed,
    MinerCreate,
    Custom,
    ContentSubmit,
    RequestToBuy,
    LeaveRatingAndComment,
    ContentCancellation,
    AssetFundPools,
    AssetReserve,
    AssetClaimFees,
    UpdateAssetIssued,
}

impl OperationKind {
    pub const ALL: [OperationKind; 16] = [
        OperationKind::Transfer,
        OperationKind::AccountCreate,
        OperationKind::AccountUpdate,
        OperationKind::AssetCreate,
        OperationKind::IssueAsset,
        OperationKind::AssetPublishFeed,
        OperationKind::MinerCreate,
        OperationKind::Custom,
        OperationKind::ContentSubmit,
        OperationKind::RequestToBuy,
        OperationKind::LeaveRatingAndComment,
        OperationKind::ContentCancellation,
        OperationKind::AssetFundPools,
        OperationKind::AssetReserve,
        OperationKind::AssetClaimFees,
        OperationKind::UpdateAssetIssued,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Transfer => "transfer",
            OperationKind::AccountCreate => "account_create",
            OperationKind::AccountUpdate => "account_update",
            OperationKind::AssetCreate => "asset_create",
            OperationKind::IssueAsset => "issue_asset",
            OperationKind::AssetPublishFeed => "asset_publish_feed",
            OperationKind::MinerCreate => "miner_create",
            OperationKind::Custom => "custom",
            OperationKind::ContentSubmit => "content_submit",
            OperationKind::RequestToBuy => "request_to_buy",
            OperationKind::LeaveRatingAndComment => "leave_rating_and_comment",
            OperationKind::ContentCancellation => "content_cancellation",
            OperationKind::AssetFundPools => "asset_fund_pools",
            OperationKind::AssetReserve => "asset_reserve",
            OperationKind::AssetClaimFees => "asset_claim_fees",
            OperationKind::UpdateAssetIssued => "update_asset_issued",
        }
    }

    /// Position of the variant in the network's operation union.
    pub fn id(&self) -> u8 {
        match self {
            OperationKind::AccountCreate => 1,
            OperationKind::AccountUpdate => 2,
            OperationKind::AssetCreate => 3,
            OperationKind::IssueAsset => 4,
            OperationKind::AssetPublishFeed => 5,
            OperationKind::MinerCreate => 6,
            OperationKind::Custom => 18,
            OperationKind::ContentSubmit => 20,
            OperationKind::RequestToBuy => 21,
            OperationKind::LeaveRatingAndComment => 22,
            OperationKind::ContentCancellation => 32,
            OperationKind::AssetFundPools => 33,
            OperationKind::AssetReserve => 34,
            OperationKind::AssetClaimFees => 35,
            OperationKind::UpdateAssetIssued => 36,
            OperationKind::Transfer => 39,
        }
    }

    /// Fields the payload must carry. `fee` is filled in when absent.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            OperationKind::Transfer => &["from", "to", "amount"],
            OperationKind::ContentSubmit => &[
                "size",
                "author",
                "co_authors",
                "URI",
                "quorum",
                "price",
                "hash",
                "seeders",
                "key_parts",
                "expiration",
                "publishing_fee",
                "synopsis",
            ],
            OperationKind::RequestToBuy => &["URI", "consumer", "price", "region_code_from", "pubKey"],
            OperationKind::ContentCancellation => &["author", "URI"],
            OperationKind::AccountUpdate => &["account"],
            OperationKind::AccountCreate => &["name", "owner", "active", "options", "registrar"],
            OperationKind::AssetCreate => &[
                "issuer",
                "symbol",
                "precision",
                "description",
                "options",
                "is_exchangeable",
            ],
            OperationKind::IssueAsset => &["issuer", "asset_to_issue", "issue_to_account"],
            OperationKind::UpdateAssetIssued => &[
                "issuer",
                "asset_to_update",
                "new_description",
                "max_supply",
                "core_exchange_rate",
                "is_exchangeable",
            ],
            OperationKind::AssetFundPools => &["from_account", "uia_asset", "dct_asset"],
            OperationKind::AssetReserve => &["payer", "amount_to_reserve"],
            OperationKind::AssetClaimFees => &["issuer", "uia_asset", "dct_asset"],
            OperationKind::AssetPublishFeed => &["publisher", "asset_id", "feed"],
            OperationKind::LeaveRatingAndComment => &["URI", "consumer", "comment", "rating"],
            OperationKind::MinerCreate => &["miner_account", "url", "block_signing_key"],
            OperationKind::Custom => &["payer", "required_auths", "id", "data"],
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperationKind {
    type Err = DcoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| DcoreError::InvalidOperationSchema {
                operation: s.to_string(),
                missing: Vec::new(),
            })
    }
}

/// A validated operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    kind: OperationKind,
    payload: Map<String, Value>,
}

impl Operation {
    /// Validate `payload` against the required fields of `kind`.
    pub fn new(kind: OperationKind, payload: Value) -> DcoreResult<Self> {
        let Value::Object(payload) = payload else {
            return Err(DcoreError::InvalidOperationSchema {
                operation: kind.name().to_string(),
                missing: kind.required_fields().iter().map(|f| f.to_string()).collect(),
            });
        };

        let missing: Vec<String> = kind
            .required_fields()
            .iter()
            .filter(|field| payload.get(**field).map_or(true, Value::is_null))
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DcoreError::InvalidOperationSchema {
                operation: kind.name().to_string(),
                missing,
            });
        }

        Ok(Self { kind, payload })
    }

    /// Parse by operation name.
    pub fn named(name: &str, payload: Value) -> DcoreResult<Self> {
        Self::new(name.parse()?, payload)
    }

    pub fn transfer(
        from: &str,
        to: &str,
        amount: AssetAmount,
        memo: Option<Memo>,
    ) -> DcoreResult<Self> {
        let mut payload = json!({ "from": from, "to": to, "amount": amount });
        if let Some(memo) = memo {
            payload["memo"] = serde_json::to_value(memo)
                .map_err(|e| DcoreError::Crypto(format!("Memo serialization failed: {}", e)))?;
        }
        Self::new(OperationKind::Transfer, payload)
    }

    /// Buy content, proving the purchase with `el_gamal`'s public half.
    pub fn request_to_buy(
        uri: &str,
        consumer: &str,
        price: AssetAmount,
        region_code_from: u32,
        el_gamal: &ElGamalKeyPair,
    ) -> DcoreResult<Self> {
        Self::new(
            OperationKind::RequestToBuy,
            json!({
                "URI": uri,
                "consumer": consumer,
                "price": price,
                "region_code_from": region_code_from,
                "pubKey": { "s": el_gamal.public_decimal() },
            }),
        )
    }

    pub fn content_cancellation(author: &str, uri: &str) -> DcoreResult<Self> {
        Self::new(
            OperationKind::ContentCancellation,
            json!({ "author": author, "URI": uri }),
        )
    }

    pub fn leave_rating_and_comment(
        uri: &str,
        consumer: &str,
        rating: u8,
        comment: &str,
    ) -> DcoreResult<Self> {
        Self::new(
            OperationKind::LeaveRatingAndComment,
            json!({ "URI": uri, "consumer": consumer, "rating": rating, "comment": comment }),
        )
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn fee(&self) -> Option<&Value> {
        self.payload.get("fee")
    }

    pub fn set_fee(&mut self, fee: Value) {
        self.payload.insert("fee".to_string(), fee);
    }

    /// Insert a zero fee in `asset_id` unless a fee is present.
    pub fn ensure_fee(&mut self, asset_id: &str) {
        if self.payload.get("fee").map_or(true, Value::is_null) {
            self.set_fee(json!(AssetAmount::zero(asset_id)));
        }
    }

    /// `[variant_id, payload]`.
    pub fn to_json(&self) -> Value {
        json!([self.kind.id(), Value::Object(self.payload.clone())])
    }
}
