//! Bounded fan-out of blocking oracle calls.

use bitcoin::Address;
use segwallet_electrum::ChainOracle;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::WalletError;

type OracleResult<T> = Result<T, segwallet_electrum::Error>;

/// Run `query` against every address, failing on the first oracle error.
pub(crate) async fn query_all<O, T, F>(
    oracle: &Arc<O>,
    addresses: Vec<Address>,
    max_in_flight: usize,
    cancel: &CancellationToken,
    query: F,
) -> Result<Vec<T>, WalletError>
where
    O: ChainOracle + 'static,
    T: Send + 'static,
    F: Fn(&O, &Address) -> OracleResult<T> + Copy + Send + Sync + 'static,
{
    query_each(oracle, addresses, max_in_flight, cancel, query)
        .await?
        .into_iter()
        .map(|answer| {
            answer.map_err(|e| {
                log::warn!("Oracle query failed: {}", e);
                WalletError::from(e)
            })
        })
        .collect()
}

/// Run `query` against every address on the blocking pool, at most
/// `max_in_flight` at a time.
///
/// Answers come back in the order of `addresses` regardless of completion
/// order, each with its own oracle outcome. Only cancellation or a failed
/// task aborts the rest.
pub(crate) async fn query_each<O, T, F>(
    oracle: &Arc<O>,
    addresses: Vec<Address>,
    max_in_flight: usize,
    cancel: &CancellationToken,
    query: F,
) -> Result<Vec<OracleResult<T>>, WalletError>
where
    O: ChainOracle + 'static,
    T: Send + 'static,
    F: Fn(&O, &Address) -> OracleResult<T> + Copy + Send + Sync + 'static,
{
    let permits = Arc::new(Semaphore::new(max_in_flight.max(1)));
    let mut slots: Vec<Option<OracleResult<T>>> = addresses.iter().map(|_| None).collect();
    let mut tasks = JoinSet::new();

    for (slot, address) in addresses.into_iter().enumerate() {
        let oracle = Arc::clone(oracle);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| WalletError::Task(e.to_string()))?;
            let answer = tokio::task::spawn_blocking(move || query(oracle.as_ref(), &address))
                .await
                .map_err(|e| WalletError::Task(e.to_string()))?;
            Ok::<_, WalletError>((slot, answer))
        });
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tasks.abort_all();
                return Err(WalletError::Cancelled);
            }
            joined = tasks.join_next() => match joined {
                None => break,
                Some(Ok(Ok((slot, answer)))) => slots[slot] = Some(answer),
                Some(Ok(Err(e))) => {
                    tasks.abort_all();
                    return Err(e);
                }
                Some(Err(e)) => {
                    tasks.abort_all();
                    return Err(WalletError::Task(e.to_string()));
                }
            }
        }
    }

    slots
        .into_iter()
        .map(|v| v.ok_or_else(|| WalletError::Task("query result missing".to_string())))
        .collect()
}
