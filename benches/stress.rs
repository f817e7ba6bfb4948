use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use time::macros::{date, time};
use time::{Date, Time};
use ulid::Ulid;

use hotdesk::{
    BookingPolicy, Decision, Engine, JournalStore, NotifyHub, Party, Store, TimeWindow,
};

const DATE: Date = date!(2026 - 03 - 02);

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

fn slot(i: usize) -> TimeWindow {
    // 1440 one-minute slots per day, spread across dates by chunk
    let date = DATE
        .checked_add(time::Duration::days((i / 1440) as i64))
        .unwrap();
    let minute = (i % 1440) as u16;
    let start = Time::from_hms((minute / 60) as u8, (minute % 60) as u8, 0).unwrap();
    let end = start + time::Duration::seconds(59);
    TimeWindow::new(date, start, end)
}

fn party(i: usize) -> Party {
    Party {
        id: format!("party-{i}"),
        name: format!("Party {i}"),
        contact: format!("party-{i}@example.com"),
    }
}

async fn setup(engine: &Engine) -> Vec<(Ulid, u32)> {
    let capacities = [1u32, 1, 1, 1, 1, 5, 5, 5, 10, 10];
    let mut resources = Vec::new();
    for &cap in &capacities {
        let rid = Ulid::new();
        let policy = if cap == 1 {
            BookingPolicy::exclusive()
        } else {
            BookingPolicy::capacity(cap, true)
        };
        engine
            .register_resource(rid, None, policy, "bench")
            .await
            .unwrap();
        resources.push((rid, cap));
    }
    println!("  created {} resources", resources.len());
    resources
}

async fn phase1_sequential(engine: &Engine, rid: Ulid) {
    let mut latencies = Vec::with_capacity(2000);
    for i in 0..2000 {
        let start = Instant::now();
        let d = engine
            .request_booking(Ulid::new(), rid, &party(i), slot(i), "bench")
            .await
            .unwrap();
        assert_eq!(d, Decision::Accepted);
        latencies.push(start.elapsed());
    }
    print_latency("sequential bookings", &mut latencies);
}

async fn phase2_concurrent(engine: Arc<Engine>, resources: &[(Ulid, u32)]) {
    let accepted = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();
    let mut handles = Vec::new();
    for (t, &(rid, _)) in resources.iter().enumerate() {
        let engine = engine.clone();
        let accepted = accepted.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..500 {
                let idx = t * 10_000 + i;
                let d = engine
                    .request_booking(Ulid::new(), rid, &party(idx), slot(i), "bench")
                    .await
                    .unwrap();
                if d.is_accepted() {
                    accepted.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    let elapsed = start.elapsed();
    let total = resources.len() * 500;
    println!(
        "  {} tasks x 500 requests: {}/{} accepted in {:.2}s ({:.0} req/s)",
        resources.len(),
        accepted.load(Ordering::Relaxed),
        total,
        elapsed.as_secs_f64(),
        total as f64 / elapsed.as_secs_f64(),
    );
}

async fn phase3_read_under_load(engine: Arc<Engine>, rid: Ulid) {
    let stop = Arc::new(AtomicUsize::new(0));
    let writer = {
        let engine = engine.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            let mut i = 50_000;
            while stop.load(Ordering::Relaxed) == 0 {
                let _ = engine
                    .request_booking(Ulid::new(), rid, &party(i), slot(i % 4000), "bench")
                    .await;
                i += 1;
            }
        })
    };

    let mut latencies = Vec::with_capacity(2000);
    for _ in 0..2000 {
        let start = Instant::now();
        let _ = engine
            .free_windows(rid, DATE, time!(00:00), time!(23:59), None)
            .await
            .unwrap();
        latencies.push(start.elapsed());
    }
    stop.store(1, Ordering::Relaxed);
    writer.await.unwrap();
    print_latency("free-window queries under write load", &mut latencies);
}

async fn phase4_promotion_storm(engine: Arc<Engine>) {
    let rid = Ulid::new();
    engine
        .register_resource(rid, None, BookingPolicy::capacity(1, true), "bench")
        .await
        .unwrap();
    let w = slot(0);

    let holder = Ulid::new();
    engine
        .request_booking(holder, rid, &party(900_000), w, "bench")
        .await
        .unwrap();
    for i in 0..1000 {
        engine
            .request_booking(Ulid::new(), rid, &party(900_001 + i), w, "bench")
            .await
            .unwrap();
    }

    // Each cancel frees exactly one slot and promotes exactly one party
    let start = Instant::now();
    let mut cancel_id = holder;
    for _ in 0..1000 {
        let promoted = engine.cancel_booking(cancel_id, "bench").await.unwrap();
        assert_eq!(promoted.len(), 1);
        cancel_id = promoted[0];
    }
    let elapsed = start.elapsed();
    println!(
        "  1000 cancel+promote cascades in {:.2}s ({:.0} ops/s)",
        elapsed.as_secs_f64(),
        1000.0 / elapsed.as_secs_f64(),
    );
}

#[tokio::main]
async fn main() {
    println!("=== hotdesk stress benchmark ===\n");

    let dir = std::env::temp_dir().join("hotdesk_bench");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("bench_{}.journal", Ulid::new()));
    let store: Arc<dyn Store> = Arc::new(JournalStore::open(&path).unwrap());
    let engine = Arc::new(
        Engine::new(store, Arc::new(NotifyHub::new()))
            .await
            .unwrap(),
    );

    println!("[setup]");
    let resources = setup(&engine).await;

    println!("\n[phase 1] sequential booking throughput");
    phase1_sequential(&engine, resources[9].0).await;

    println!("\n[phase 2] concurrent booking throughput");
    phase2_concurrent(engine.clone(), &resources).await;

    println!("\n[phase 3] read latency under write load");
    phase3_read_under_load(engine.clone(), resources[8].0).await;

    println!("\n[phase 4] promotion cascade storm");
    phase4_promotion_storm(engine.clone()).await;

    let _ = std::fs::remove_file(&path);
    println!("\n=== benchmark complete ===");
}
