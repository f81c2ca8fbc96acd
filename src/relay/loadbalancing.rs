//! Client-side upstream selection: picks a server uniformly at random,
//! independent of its health, so connections spread evenly across the
//! configured pool as their number grows.

use rand::Rng;

use crate::context::UpstreamServer;

/// Picks one of `servers` uniformly at random. `servers` must be non-empty;
/// callers are expected to have validated this at config-load time.
pub fn pick_server(servers: &[UpstreamServer]) -> &UpstreamServer {
    debug_assert!(!servers.is_empty(), "server pool must not be empty");
    let idx = rand::thread_rng().gen_range(0, servers.len());
    &servers[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn servers(n: usize) -> Vec<UpstreamServer> {
        (0..n)
            .map(|i| UpstreamServer {
                addr: format!("127.0.0.1:{}", 10000 + i).parse::<SocketAddr>().unwrap(),
                psk: vec![0u8; 4],
            })
            .collect()
    }

    #[test]
    fn single_server_is_always_picked() {
        let pool = servers(1);
        for _ in 0..100 {
            assert_eq!(pick_server(&pool).addr, pool[0].addr);
        }
    }

    #[test]
    fn distribution_tends_to_uniform() {
        let pool = servers(4);
        let mut counts = [0u32; 4];
        const TRIALS: u32 = 40_000;

        for _ in 0..TRIALS {
            let picked = pick_server(&pool);
            let idx = pool.iter().position(|s| s.addr == picked.addr).unwrap();
            counts[idx] += 1;
        }

        let expected = TRIALS as f64 / pool.len() as f64;
        for count in counts.iter() {
            let deviation = (*count as f64 - expected).abs() / expected;
            assert!(deviation < 0.1, "distribution skewed: {:?}", counts);
        }
    }
}
