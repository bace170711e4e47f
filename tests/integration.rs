use std::collections::HashSet;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Barrier, Mutex,
};
use std::thread;

use matches::assert_matches;
use rand::Rng;

use taskqueue::{ConfigBuilder, Queue, Task, TaskQueue};

const PRODUCERS: usize = 4;
const CONSUMERS: usize = 4;
const PER_PRODUCER: usize = 10_000;

struct DropCount(Arc<AtomicUsize>);

impl Clone for DropCount {
    #[inline]
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl Drop for DropCount {
    #[inline]
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn mpmc_no_loss_no_duplicates() {
    let queue = Arc::new(Queue::with_config(ConfigBuilder::new().scan_threshold(16).build()));
    let barrier = Arc::new(Barrier::new(PRODUCERS + CONSUMERS));
    let done = Arc::new(AtomicBool::new(false));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|id| {
            let queue = Arc::clone(&queue);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for seq in 0..PER_PRODUCER {
                    queue.enqueue((id, seq)).unwrap();
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let barrier = Arc::clone(&barrier);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut last_seen = vec![None; PRODUCERS];
                let mut dequeued = Vec::new();
                barrier.wait();

                loop {
                    match queue.dequeue() {
                        Some((id, seq)) => {
                            // elements of a single producer are dequeued in FIFO order
                            if let Some(last) = last_seen[id] {
                                assert!(seq > last, "producer {}: {} after {}", id, seq, last);
                            }

                            last_seen[id] = Some(seq);
                            dequeued.push((id, seq));
                        }
                        None if done.load(Ordering::Acquire) => {
                            // drain everything enqueued before `done` was set
                            match queue.dequeue() {
                                Some(elem) => dequeued.push(elem),
                                None => return dequeued,
                            }
                        }
                        None => thread::yield_now(),
                    }
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }

    done.store(true, Ordering::Release);

    let mut all = HashSet::new();
    for consumer in consumers {
        for elem in consumer.join().unwrap() {
            assert!(all.insert(elem), "element {:?} dequeued twice", elem);
        }
    }

    assert_eq!(all.len(), PRODUCERS * PER_PRODUCER);
    assert_eq!(queue.size(), 0);
    assert!(queue.is_empty());
}

#[test]
fn concurrent_peek() {
    const COUNT: usize = 5_000;

    let queue = Arc::new(Queue::with_config(ConfigBuilder::new().scan_threshold(1).build()));
    for i in 0..COUNT {
        queue.enqueue(i).unwrap();
    }

    let peekers: Vec<_> = (0..2)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut last = 0;
                while let Some(peeked) = queue.peek() {
                    // the front of the queue only ever moves forward
                    assert!(peeked >= last);
                    last = peeked;
                }
            })
        })
        .collect();

    let dequeuers: Vec<_> = (0..2)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut count = 0;
                while queue.dequeue().is_some() {
                    count += 1;
                }

                count
            })
        })
        .collect();

    let dequeued: usize = dequeuers.into_iter().map(|handle| handle.join().unwrap()).sum();
    for peeker in peekers {
        peeker.join().unwrap();
    }

    assert_eq!(dequeued, COUNT);
    assert_eq!(queue.peek(), None);
}

#[test]
fn random_interleaving_size() {
    const THREADS: usize = 8;
    const OPS: usize = 2_000;

    let queue = Arc::new(Queue::new());
    let enqueued = Arc::new(AtomicUsize::new(0));
    let dequeued = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let (queue, enqueued, dequeued) =
                (Arc::clone(&queue), Arc::clone(&enqueued), Arc::clone(&dequeued));
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for i in 0..OPS {
                    match rng.gen_range(0..3) {
                        0 | 1 => {
                            queue.enqueue(i).unwrap();
                            enqueued.fetch_add(1, Ordering::Relaxed);
                        }
                        _ => {
                            if queue.dequeue().is_some() {
                                dequeued.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }

                    if rng.gen_bool(0.01) {
                        let _ = queue.peek();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // at quiescence, the advisory size is exact
    let expected = enqueued.load(Ordering::Relaxed) - dequeued.load(Ordering::Relaxed);
    assert_eq!(queue.size(), expected);

    let mut remaining = 0;
    while queue.dequeue().is_some() {
        remaining += 1;
    }

    assert_eq!(remaining, expected);
}

#[test]
fn thread_pool_handoff() {
    const TASKS: usize = 1_000;
    const WORKERS: usize = 4;

    let queue: Arc<TaskQueue> = Arc::new(TaskQueue::new());
    let executed = Arc::new(Mutex::new(Vec::with_capacity(TASKS)));

    for i in 0..TASKS {
        let task = Task::new(
            |(executed, i): &(Arc<Mutex<Vec<usize>>>, usize)| executed.lock().unwrap().push(*i),
            (Arc::clone(&executed), i),
        );
        queue.enqueue(task).unwrap();
    }

    let workers: Vec<_> = (0..WORKERS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                while let Some(task) = queue.dequeue() {
                    task.run();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let mut executed = executed.lock().unwrap().clone();
    executed.sort_unstable();
    assert_eq!(executed, (0..TASKS).collect::<Vec<_>>());
}

#[test]
fn destroy_after_concurrent_use() {
    const ENQUEUED: usize = 2_000;
    const DEQUEUED_PER_THREAD: usize = 250;

    let drop_count = Arc::new(AtomicUsize::new(0));
    let queue = Arc::new(Queue::new());
    for _ in 0..ENQUEUED {
        queue.enqueue(DropCount(Arc::clone(&drop_count))).unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for _ in 0..DEQUEUED_PER_THREAD {
                    assert!(queue.dequeue().is_some());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let queue = Arc::try_unwrap(queue).ok().unwrap();
    let mut destroyed = 0;
    let res = queue.destroy(|_elem| -> Result<(), ()> {
        destroyed += 1;
        Ok(())
    });

    assert_matches!(res, Ok(()));
    assert_eq!(destroyed, ENQUEUED - 4 * DEQUEUED_PER_THREAD);
    // every element has been dropped once, plus each clone handed out by a
    // dequeue
    assert_eq!(drop_count.load(Ordering::Relaxed), ENQUEUED + 4 * DEQUEUED_PER_THREAD);
}
