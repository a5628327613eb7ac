//! Variant policy.
//!
//! All protocol variants run the same session skeleton. What differs is
//! captured twice: at runtime by [`VariantKind`] and its [`Capabilities`]
//! row, and at compile time by marker types implementing [`Variant`] plus
//! capability traits ([`Negotiated`], [`Disputable`], [`RangeDelivery`],
//! [`KeywordLookup`]) that gate which session methods exist.
//!
//! | Variant          | Negotiation | Claim | Demand   | Id width (plain / table) |
//! |------------------|-------------|-------|----------|--------------------------|
//! | `Batch`          | no          | no    | ranges   | 32 / 32                  |
//! | `Complaint`      | no          | yes   | ranges   | 32 / 40                  |
//! | `AtomicSwap`     | no          | no    | ranges   | 40 / 40                  |
//! | `AtomicSwapVc`   | no          | no    | ranges   | 40 / 40                  |
//! | `OtBatch`        | yes         | no    | ranges   | 32 / 32                  |
//! | `OtComplaint`    | yes         | yes   | ranges   | 40 / 40                  |
//! | `Vrfq`           | no          | no    | keywords | - / 40                   |
//! | `OtVrfq`         | yes         | no    | keywords | - / 32                   |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{DataMode, IdWidth, KeywordSet, PhantomKeywords, PhantomRanges, Query, RangeSet};

/// Runtime name of a protocol variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    Batch,
    Complaint,
    AtomicSwap,
    AtomicSwapVc,
    OtBatch,
    OtComplaint,
    Vrfq,
    OtVrfq,
}

/// What a variant's sessions may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// OT negotiation precedes the request phase.
    pub negotiation: bool,
    /// The buyer may generate a claim after rejecting a secret.
    pub claim: bool,
    /// Demands are keyword lookups rather than record ranges.
    pub keyword_query: bool,
    /// The buyer decrypts demanded records after a verified secret.
    pub decrypt: bool,
    /// The key commitment is a Pedersen commitment.
    pub verifiable_commitment: bool,
}

impl VariantKind {
    pub const ALL: [VariantKind; 8] = [
        VariantKind::Batch,
        VariantKind::Complaint,
        VariantKind::AtomicSwap,
        VariantKind::AtomicSwapVc,
        VariantKind::OtBatch,
        VariantKind::OtComplaint,
        VariantKind::Vrfq,
        VariantKind::OtVrfq,
    ];

    pub const fn capabilities(self) -> Capabilities {
        use VariantKind::*;
        let negotiation = matches!(self, OtBatch | OtComplaint | OtVrfq);
        let claim = matches!(self, Complaint | OtComplaint);
        let keyword_query = matches!(self, Vrfq | OtVrfq);
        Capabilities {
            negotiation,
            claim,
            keyword_query,
            decrypt: !keyword_query,
            verifiable_commitment: matches!(self, AtomicSwapVc),
        }
    }

    /// Identifier width expected for `mode`, or `None` if the variant does
    /// not run over that mode.
    pub const fn id_width(self, mode: DataMode) -> Option<IdWidth> {
        use DataMode::*;
        use IdWidth::*;
        use VariantKind::*;
        match (self, mode) {
            (Batch, _) | (OtBatch, _) => Some(Narrow),
            (Complaint, Plain) => Some(Narrow),
            (Complaint, Table) => Some(Wide),
            (AtomicSwap, _) | (AtomicSwapVc, _) | (OtComplaint, _) => Some(Wide),
            (Vrfq, Table) => Some(Wide),
            (OtVrfq, Table) => Some(Narrow),
            (Vrfq, Plain) | (OtVrfq, Plain) => None,
        }
    }

    pub const fn supports_mode(self, mode: DataMode) -> bool {
        self.id_width(mode).is_some()
    }

    pub const fn name(self) -> &'static str {
        match self {
            VariantKind::Batch => "batch",
            VariantKind::Complaint => "complaint",
            VariantKind::AtomicSwap => "atomic_swap",
            VariantKind::AtomicSwapVc => "atomic_swap_vc",
            VariantKind::OtBatch => "ot_batch",
            VariantKind::OtComplaint => "ot_complaint",
            VariantKind::Vrfq => "vrfq",
            VariantKind::OtVrfq => "ot_vrfq",
        }
    }

    /// Whether a buyer query has the shape this variant expects.
    pub fn accepts(self, query: &Query) -> bool {
        let caps = self.capabilities();
        query.is_keyword() == caps.keyword_query && query.has_phantoms() == caps.negotiation
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compile-time variant marker.
pub trait Variant: Send + Sync + 'static {
    const KIND: VariantKind;

    /// What the buyer supplies at session creation.
    type Demand: Into<Query>;
}

/// Variants whose sessions negotiate before the request phase.
pub trait Negotiated: Variant {}

/// Variants whose buyers may generate a claim.
pub trait Disputable: Variant {}

/// Variants delivering record ranges the buyer decrypts.
pub trait RangeDelivery: Variant {}

/// Variants resolving keyword lookups to record positions.
pub trait KeywordLookup: Variant {}

macro_rules! variant_marker {
    ($(#[$doc:meta])* $name:ident, $kind:ident, $demand:ty, [$($cap:ident),*]) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub enum $name {}

        impl Variant for $name {
            const KIND: VariantKind = VariantKind::$kind;
            type Demand = $demand;
        }

        $(impl $cap for $name {})*
    };
}

variant_marker!(
    /// Straight-line delivery.
    Batch, Batch, RangeSet, [RangeDelivery]
);
variant_marker!(
    /// Delivery with a dispute path.
    Complaint, Complaint, RangeSet, [RangeDelivery, Disputable]
);
variant_marker!(
    /// Delivery where failure simply aborts the swap.
    AtomicSwap, AtomicSwap, RangeSet, [RangeDelivery]
);
variant_marker!(
    /// Atomic swap with a Pedersen key commitment.
    AtomicSwapVc, AtomicSwapVc, RangeSet, [RangeDelivery]
);
variant_marker!(
    /// Batch delivery with the demand hidden in a phantom set.
    OtBatch, OtBatch, PhantomRanges, [RangeDelivery, Negotiated]
);
variant_marker!(
    /// Complaint delivery with the demand hidden in a phantom set.
    OtComplaint, OtComplaint, PhantomRanges, [RangeDelivery, Negotiated, Disputable]
);
variant_marker!(
    /// Keyword lookup over table data.
    Vrfq, Vrfq, KeywordSet, [KeywordLookup]
);
variant_marker!(
    /// Keyword lookup with the demand hidden in a phantom set.
    OtVrfq, OtVrfq, PhantomKeywords, [KeywordLookup, Negotiated]
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Range;

    fn negotiated<V: Negotiated>() -> VariantKind {
        V::KIND
    }
    fn disputable<V: Disputable>() -> VariantKind {
        V::KIND
    }
    fn ranged<V: RangeDelivery>() -> VariantKind {
        V::KIND
    }
    fn keyworded<V: KeywordLookup>() -> VariantKind {
        V::KIND
    }

    #[test]
    fn marker_traits_match_capability_table() {
        for kind in [negotiated::<OtBatch>(), negotiated::<OtComplaint>(), negotiated::<OtVrfq>()] {
            assert!(kind.capabilities().negotiation, "{kind}");
        }
        for kind in [disputable::<Complaint>(), disputable::<OtComplaint>()] {
            assert!(kind.capabilities().claim, "{kind}");
        }
        for kind in [
            ranged::<Batch>(),
            ranged::<Complaint>(),
            ranged::<AtomicSwap>(),
            ranged::<AtomicSwapVc>(),
            ranged::<OtBatch>(),
            ranged::<OtComplaint>(),
        ] {
            assert!(kind.capabilities().decrypt, "{kind}");
        }
        for kind in [keyworded::<Vrfq>(), keyworded::<OtVrfq>()] {
            assert!(kind.capabilities().keyword_query, "{kind}");
        }
    }

    #[test]
    fn capability_counts() {
        let caps: Vec<Capabilities> = VariantKind::ALL.iter().map(|k| k.capabilities()).collect();
        assert_eq!(caps.iter().filter(|c| c.negotiation).count(), 3);
        assert_eq!(caps.iter().filter(|c| c.claim).count(), 2);
        assert_eq!(caps.iter().filter(|c| c.keyword_query).count(), 2);
        assert_eq!(caps.iter().filter(|c| c.verifiable_commitment).count(), 1);
    }

    #[test]
    fn identifier_widths() {
        use DataMode::*;
        assert_eq!(VariantKind::Batch.id_width(Plain), Some(IdWidth::Narrow));
        assert_eq!(VariantKind::Complaint.id_width(Plain), Some(IdWidth::Narrow));
        assert_eq!(VariantKind::Complaint.id_width(Table), Some(IdWidth::Wide));
        assert_eq!(VariantKind::AtomicSwapVc.id_width(Plain), Some(IdWidth::Wide));
        assert_eq!(VariantKind::OtComplaint.id_width(Plain), Some(IdWidth::Wide));
        assert_eq!(VariantKind::Vrfq.id_width(Table), Some(IdWidth::Wide));
        assert_eq!(VariantKind::OtVrfq.id_width(Table), Some(IdWidth::Narrow));
        assert!(!VariantKind::Vrfq.supports_mode(Plain));
        assert!(!VariantKind::OtVrfq.supports_mode(Plain));
    }

    #[test]
    fn query_shapes() {
        let demands = RangeSet::new(vec![Range::new(0, 2)]).unwrap();
        let phantoms = RangeSet::new(vec![Range::new(0, 4)]).unwrap();
        let plain = Query::from(demands.clone());
        let hidden = Query::from(PhantomRanges::new(demands, phantoms).unwrap());
        let keywords = Query::from(KeywordSet::new("name", ["alice"]).unwrap());

        assert!(VariantKind::Batch.accepts(&plain));
        assert!(!VariantKind::Batch.accepts(&hidden));
        assert!(VariantKind::OtComplaint.accepts(&hidden));
        assert!(!VariantKind::OtComplaint.accepts(&plain));
        assert!(VariantKind::Vrfq.accepts(&keywords));
        assert!(!VariantKind::OtVrfq.accepts(&keywords));
    }

    #[test]
    fn names_are_snake_case_and_match_serde() {
        for kind in VariantKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.name()));
        }
    }
}
