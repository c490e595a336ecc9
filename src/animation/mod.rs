//! Animation scheduler
//!
//! A timer-driven interpolation engine shared by all registered clients,
//! ticking at the refresh interval of the fastest active output (60 Hz
//! equivalent when none is active). Animations drive visual effects that
//! are not gated on client acknowledgement (fades, move/resize easing)
//! and never block: progress simply advances each tick until it clamps at
//! 1.0.
//!
//! Like the transaction queue, the scheduler is generic over the context
//! its callbacks mutate.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use log::trace;

/// Stable handle to an animation client. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimationId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationState {
    /// Not queued.
    None,
    /// Queued, before its first tick.
    Waiting,
    /// Advancing.
    Running,
}

/// Easing curves applied to the raw progress before it reaches the update
/// callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EasingCurve {
    Linear,
    EaseIn,
    #[default]
    EaseOut,
    EaseInOut,
}

impl EasingCurve {
    pub fn from_name(name: &str) -> Self {
        match name {
            "linear" => Self::Linear,
            "ease-in" => Self::EaseIn,
            "ease-out" => Self::EaseOut,
            "ease-in-out" => Self::EaseInOut,
            _ => Self::default(),
        }
    }

    pub fn apply(self, progress: f32) -> f32 {
        let t = progress.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Self::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }
}

type UpdateFn<C> = Box<dyn FnMut(&mut C, f32)>;
type DoneFn<C> = Box<dyn FnOnce(&mut C, bool)>;

struct Client<C> {
    progress: f32,
    duration_ms: u32,
    state: AnimationState,
    easing: EasingCurve,
    update: UpdateFn<C>,
    /// Taken exactly once, by completion or cancellation.
    done: Option<DoneFn<C>>,
}

/// Scheduler state: client records plus the tick queue. The queue holds
/// ids only; a record unlinked mid-tick simply fails the lookup.
pub struct AnimationScheduler<C> {
    clients: HashMap<AnimationId, Client<C>>,
    /// Head is the most recently added client; ticks run head-first, so
    /// evaluation is LIFO with respect to insertion.
    queue: VecDeque<AnimationId>,
    next_id: u64,
    deadline: Option<Instant>,
    /// Reentrancy guard: the client currently inside its update callback.
    active: Option<AnimationId>,
    active_cancelled: bool,
}

impl<C> AnimationScheduler<C> {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            queue: VecDeque::new(),
            next_id: 1,
            deadline: None,
            active: None,
            active_cancelled: false,
        }
    }

    /// Register and queue a new client at the head of the pending list,
    /// arming the timer for immediate execution.
    pub fn start<U, D>(&mut self, duration_ms: u32, easing: EasingCurve, update: U, done: D) -> AnimationId
    where
        U: FnMut(&mut C, f32) + 'static,
        D: FnOnce(&mut C, bool) + 'static,
    {
        let id = AnimationId(self.next_id);
        self.next_id += 1;
        self.clients.insert(
            id,
            Client {
                progress: 0.0,
                duration_ms: duration_ms.max(1),
                state: AnimationState::Waiting,
                easing,
                update: Box::new(update),
                done: Some(Box::new(done)),
            },
        );
        self.queue.push_front(id);
        self.deadline = Some(Instant::now());
        trace!("animation {:?} queued ({} running)", id, self.queue.len());
        id
    }

    /// Idempotent re-queue of an existing client: progress resets to zero
    /// and the client moves to the head of the list. Returns false for an
    /// unknown (completed or cancelled) id.
    pub fn restart(&mut self, id: AnimationId) -> bool {
        let Some(client) = self.clients.get_mut(&id) else {
            return false;
        };
        client.progress = 0.0;
        client.state = AnimationState::Waiting;
        self.queue.retain(|&q| q != id);
        self.queue.push_front(id);
        self.deadline = Some(Instant::now());
        true
    }

    pub fn state(&self, id: AnimationId) -> AnimationState {
        self.clients
            .get(&id)
            .map(|c| c.state)
            .unwrap_or(AnimationState::None)
    }

    pub fn progress(&self, id: AnimationId) -> Option<f32> {
        self.clients.get(&id).map(|c| c.progress)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Next tick deadline; `None` while idle.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl<C> Default for AnimationScheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Advance every queued client by one tick of `interval`, LIFO order.
///
/// `update` runs unconditionally, including on the terminal tick; when
/// progress clamps at 1.0 the client is dequeued and `done(cancelled =
/// false)` fires. The loop tolerates a client cancelling itself (or any
/// other client) from inside its own update callback. Returns the number
/// of clients that completed.
pub fn tick<C>(
    ctx: &mut C,
    access: fn(&mut C) -> &mut AnimationScheduler<C>,
    interval: Duration,
) -> usize {
    let sched = access(ctx);
    let taken = std::mem::take(&mut sched.queue);
    let step_ms = interval.as_secs_f32() * 1000.0;

    let mut survivors: Vec<AnimationId> = Vec::new();
    let mut completed = 0;
    for id in taken {
        let sched = access(ctx);
        let Some(mut client) = sched.clients.remove(&id) else {
            // Cancelled earlier in this same tick.
            continue;
        };
        client.progress = (client.progress + step_ms / client.duration_ms as f32).min(1.0);
        client.state = AnimationState::Running;
        let finished = client.progress >= 1.0;
        let eased = client.easing.apply(client.progress);

        sched.active = Some(id);
        sched.active_cancelled = false;
        (client.update)(ctx, eased);
        let sched = access(ctx);
        sched.active = None;

        if sched.active_cancelled {
            client.progress = 1.0;
            if let Some(done) = client.done.take() {
                done(ctx, true);
            }
            completed += 1;
            continue;
        }
        if finished {
            if let Some(done) = client.done.take() {
                done(ctx, false);
            }
            trace!("animation {:?} completed", id);
            completed += 1;
            continue;
        }
        // The update callback may have restarted this id; keep whichever
        // record is newer.
        let sched = access(ctx);
        if !sched.clients.contains_key(&id) {
            sched.clients.insert(id, client);
            survivors.push(id);
        }
    }

    let sched = access(ctx);
    // Clients added during the tick sit at the head; survivors keep their
    // relative order behind them.
    for id in survivors {
        if !sched.queue.contains(&id) {
            sched.queue.push_back(id);
        }
    }
    sched.deadline = if sched.queue.is_empty() {
        None
    } else {
        Some(Instant::now() + interval)
    };
    completed
}

/// Dequeue a client immediately: progress forces to 1.0 and
/// `done(cancelled = true)` fires synchronously. Idempotent: cancelling
/// an unknown or already-finished id is a no-op. Safe to call from inside
/// the client's own update callback.
pub fn cancel<C>(
    ctx: &mut C,
    access: fn(&mut C) -> &mut AnimationScheduler<C>,
    id: AnimationId,
) -> bool {
    let sched = access(ctx);
    if sched.active == Some(id) {
        // Inside this client's own update: the tick loop owns the record
        // and fires `done(cancelled = true)` as soon as the callback
        // returns.
        sched.active_cancelled = true;
        return true;
    }
    let Some(mut client) = sched.clients.remove(&id) else {
        return false;
    };
    sched.queue.retain(|&q| q != id);
    if sched.queue.is_empty() {
        sched.deadline = None;
    }
    client.progress = 1.0;
    client.state = AnimationState::None;
    if let Some(done) = client.done.take() {
        done(ctx, true);
    }
    trace!("animation {:?} cancelled", id);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx {
        sched: AnimationScheduler<Ctx>,
        updates: Vec<f32>,
        done: Vec<bool>,
    }

    impl Ctx {
        fn new() -> Self {
            Self {
                sched: AnimationScheduler::new(),
                updates: Vec::new(),
                done: Vec::new(),
            }
        }
    }

    fn s(ctx: &mut Ctx) -> &mut AnimationScheduler<Ctx> {
        &mut ctx.sched
    }

    const TICK: Duration = Duration::from_micros(16_667);

    #[test]
    fn fifty_ms_animation_completes_on_third_tick() {
        let mut ctx = Ctx::new();
        let id = ctx.sched.start(
            50,
            EasingCurve::Linear,
            |ctx: &mut Ctx, p| ctx.updates.push(p),
            |ctx: &mut Ctx, cancelled| ctx.done.push(cancelled),
        );
        assert_eq!(ctx.sched.state(id), AnimationState::Waiting);

        assert_eq!(tick(&mut ctx, s, TICK), 0);
        assert_eq!(ctx.sched.state(id), AnimationState::Running);
        assert_eq!(tick(&mut ctx, s, TICK), 0);
        assert_eq!(tick(&mut ctx, s, TICK), 1);

        // Update ran on every tick including the terminal one, progress
        // clamped to exactly 1.0, done fired once with cancelled = false.
        assert_eq!(ctx.updates.len(), 3);
        assert_eq!(*ctx.updates.last().unwrap(), 1.0);
        assert_eq!(ctx.done, vec![false]);
        assert!(ctx.sched.is_empty());
        assert!(ctx.sched.deadline().is_none());
        assert_eq!(ctx.sched.state(id), AnimationState::None);
    }

    #[test]
    fn progress_is_monotonic() {
        let mut ctx = Ctx::new();
        ctx.sched.start(
            100,
            EasingCurve::EaseOut,
            |ctx: &mut Ctx, p| ctx.updates.push(p),
            |_: &mut Ctx, _| {},
        );
        for _ in 0..10 {
            tick(&mut ctx, s, TICK);
        }
        assert!(ctx.updates.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*ctx.updates.last().unwrap(), 1.0);
    }

    #[test]
    fn ticks_run_lifo() {
        let mut ctx = Ctx::new();
        ctx.sched.start(
            1000,
            EasingCurve::Linear,
            |ctx: &mut Ctx, _| ctx.updates.push(1.0),
            |_: &mut Ctx, _| {},
        );
        ctx.sched.start(
            1000,
            EasingCurve::Linear,
            |ctx: &mut Ctx, _| ctx.updates.push(2.0),
            |_: &mut Ctx, _| {},
        );

        tick(&mut ctx, s, TICK);
        // The second client was added last, so it runs first.
        assert_eq!(ctx.updates, vec![2.0, 1.0]);

        // Order is stable across ticks.
        tick(&mut ctx, s, TICK);
        assert_eq!(ctx.updates, vec![2.0, 1.0, 2.0, 1.0]);
    }

    #[test]
    fn cancel_fires_done_once_with_cancelled_true() {
        let mut ctx = Ctx::new();
        let id = ctx.sched.start(
            1000,
            EasingCurve::Linear,
            |_: &mut Ctx, _| {},
            |ctx: &mut Ctx, cancelled| ctx.done.push(cancelled),
        );
        tick(&mut ctx, s, TICK);

        assert!(cancel(&mut ctx, s, id));
        assert_eq!(ctx.done, vec![true]);
        assert!(ctx.sched.is_empty());

        // Idempotent: a second cancel is a no-op and done never re-fires.
        assert!(!cancel(&mut ctx, s, id));
        assert_eq!(ctx.done, vec![true]);

        // Further ticks never complete it a second time.
        tick(&mut ctx, s, TICK);
        assert_eq!(ctx.done, vec![true]);
    }

    #[test]
    fn client_may_cancel_itself_from_update() {
        let mut ctx = Ctx::new();
        let id_cell = std::rc::Rc::new(std::cell::Cell::new(AnimationId(0)));
        let id_for_cb = std::rc::Rc::clone(&id_cell);
        let id = ctx.sched.start(
            1000,
            EasingCurve::Linear,
            move |ctx: &mut Ctx, _| {
                let id = id_for_cb.get();
                cancel(ctx, s, id);
            },
            |ctx: &mut Ctx, cancelled| ctx.done.push(cancelled),
        );
        id_cell.set(id);

        tick(&mut ctx, s, TICK);
        assert_eq!(ctx.done, vec![true]);
        assert!(ctx.sched.is_empty());
        tick(&mut ctx, s, TICK);
        assert_eq!(ctx.done, vec![true]);
    }

    #[test]
    fn client_may_cancel_a_sibling_from_update() {
        let mut ctx = Ctx::new();
        let victim = ctx.sched.start(
            1000,
            EasingCurve::Linear,
            |ctx: &mut Ctx, _| ctx.updates.push(1.0),
            |ctx: &mut Ctx, cancelled| ctx.done.push(cancelled),
        );
        // Added last, runs first, cancels the victim before its update.
        ctx.sched.start(
            1000,
            EasingCurve::Linear,
            move |ctx: &mut Ctx, _| {
                cancel(ctx, s, victim);
            },
            |_: &mut Ctx, _| {},
        );

        tick(&mut ctx, s, TICK);
        assert!(ctx.updates.is_empty());
        assert_eq!(ctx.done, vec![true]);
        assert_eq!(ctx.sched.len(), 1);
    }

    #[test]
    fn restart_resets_progress_and_requeues() {
        let mut ctx = Ctx::new();
        let id = ctx.sched.start(
            50,
            EasingCurve::Linear,
            |ctx: &mut Ctx, p| ctx.updates.push(p),
            |ctx: &mut Ctx, cancelled| ctx.done.push(cancelled),
        );
        tick(&mut ctx, s, TICK);
        tick(&mut ctx, s, TICK);
        assert!(ctx.sched.progress(id).unwrap() > 0.5);

        assert!(ctx.sched.restart(id));
        assert_eq!(ctx.sched.progress(id), Some(0.0));
        assert_eq!(ctx.sched.len(), 1);
        assert!(ctx.done.is_empty());

        for _ in 0..3 {
            tick(&mut ctx, s, TICK);
        }
        assert_eq!(ctx.done, vec![false]);
    }

    #[test]
    fn easing_curves_hit_endpoints() {
        for curve in [
            EasingCurve::Linear,
            EasingCurve::EaseIn,
            EasingCurve::EaseOut,
            EasingCurve::EaseInOut,
        ] {
            assert_eq!(curve.apply(0.0), 0.0);
            assert_eq!(curve.apply(1.0), 1.0);
        }
        assert_eq!(EasingCurve::from_name("linear"), EasingCurve::Linear);
        assert_eq!(EasingCurve::from_name("bogus"), EasingCurve::EaseOut);
    }
}
