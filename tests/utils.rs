use metronome::ClientHandle;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const NUM_THREADS: u64 = 10;
pub const NUM_ITERATIONS: u64 = 100;

#[allow(dead_code)]
pub fn run_shared_threaded_test(client: ClientHandle, num_threads: u64, iterations: u64) {
    let threads: Vec<_> = (0..num_threads)
        .map(|_| {
            let local_client = Arc::clone(&client);

            thread::spawn(move || {
                for i in 0..iterations {
                    let mut client = local_client.lock().unwrap();
                    client.count("some.counter", i as i64).unwrap();
                    client.timing("some.timer", i).unwrap();
                    client.gauge("some.gauge", i).unwrap();
                    client.gauge("some.gauge", i as f64).unwrap();
                    client.set("some.set", i as i64).unwrap();
                    drop(client);
                    thread::sleep(Duration::from_millis(1));
                }
            })
        })
        .collect();

    for t in threads {
        t.join().unwrap();
    }
}
