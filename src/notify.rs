use crate::address::AddressSet;
use crate::amount::format_token_amount;
use crate::block::{BlockLight, InternalCall, TransactionTrace};
use num_bigint::Sign;

const NATIVE_DECIMALS: u32 = 18;
const DISPLAY_DECIMALS: usize = 4;

/// Receives one matched transaction at a time. The server-side filter is the
/// sole gate: every delivered transaction is notified, per-call ` *tracked*`
/// markers are cosmetic.
pub trait NotificationSink {
    fn notify_transaction(
        &mut self,
        block: &BlockLight,
        trace: &TransactionTrace,
        tracked: &AddressSet,
    );
}

/// Emits one header line per transaction and one line per internal call to
/// standard output. Can be swapped for an email/Slack/WeChat sink later.
pub struct StdoutSink;

impl NotificationSink for StdoutSink {
    fn notify_transaction(
        &mut self,
        block: &BlockLight,
        trace: &TransactionTrace,
        tracked: &AddressSet,
    ) {
        println!("{}", transaction_header_line(trace, block.number));
        for (index, call) in trace.calls.iter().enumerate() {
            println!("{}", internal_call_line(index, call, tracked));
        }
    }
}

pub fn transaction_header_line(trace: &TransactionTrace, block_number: u64) -> String {
    format!(
        "Matching transaction {hash} in block #{block_number} (Links https://ethq.app/tx/{hash} ,https://etherscan.io/tx/{hash})",
        hash = trace.hash,
    )
}

pub fn internal_call_line(index: usize, call: &InternalCall, tracked: &AddressSet) -> String {
    let mut from = call.caller.pretty();
    if tracked.contains(&from) {
        from.push_str(" *tracked*");
    }

    let mut to = call.address.pretty();
    if tracked.contains(&to) {
        to.push_str(" *tracked*");
    }

    let mut ether_transfer = String::new();
    if let Some(value) = &call.value {
        if value.sign() == Sign::Plus {
            ether_transfer = format!(
                ", transferred {} ETH",
                format_token_amount(Some(value), NATIVE_DECIMALS, DISPLAY_DECIMALS)
            );
        }
    }

    format!(" Internal call #{index} {from} -> {to} matched{ether_transfer}")
}
