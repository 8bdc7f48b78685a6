use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{
    service::{HistoryRecord, RemoteWinner, ServiceResult},
    AddedTickets, Category, DrawEngine, DrawError, DrawRequest, DrawTiming, GroupSize, Phase, Prize, PrizeId,
    RaffleService, Resolution, ServiceError, Snapshot, Ticket, TicketOwner,
};

/// Service recording every call, with operations that can be made to fail.
#[derive(Default)]
struct ScriptedService {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    remote: Mutex<Snapshot>,
    winners: Mutex<Vec<RemoteWinner>>,
    draw_delay: Mutex<Duration>,
    /// Time each operation takes before answering
    delays: Mutex<HashMap<&'static str, Duration>>,
    next_id: AtomicUsize,
}

impl ScriptedService {
    fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }
    fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == op).count()
    }
    fn delay(&self, op: &'static str, delay: Duration) {
        self.delays.lock().unwrap().insert(op, delay);
    }
    async fn call(&self, op: &'static str) -> ServiceResult<()> {
        let delay = self.delays.lock().unwrap().get(op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(op.to_string());
        if self.failing.lock().unwrap().contains(op) {
            Err(ServiceError::Http { status: 500, message: format!("{} failed", op) })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RaffleService for ScriptedService {
    async fn fetch_tickets(&self) -> ServiceResult<Vec<Ticket>> {
        self.call("fetch_tickets").await?;
        Ok(self.remote.lock().unwrap().tickets.clone())
    }
    async fn fetch_prizes(&self) -> ServiceResult<Vec<Prize>> {
        self.call("fetch_prizes").await?;
        Ok(self.remote.lock().unwrap().prizes.clone())
    }
    async fn fetch_categories(&self) -> ServiceResult<Vec<Category>> {
        self.call("fetch_categories").await?;
        Ok(self.remote.lock().unwrap().categories.clone())
    }
    async fn fetch_owners(&self) -> ServiceResult<Vec<TicketOwner>> {
        self.call("fetch_owners").await?;
        Ok(self.remote.lock().unwrap().owners.clone())
    }
    async fn create_ticket(&self, _: &Ticket) -> ServiceResult<()> {
        self.call("create_ticket").await
    }
    async fn delete_ticket(&self, ticket: &Ticket) -> ServiceResult<()> {
        self.call("delete_ticket").await?;
        if ticket.as_str() == "0002" {
            self.call("delete_ticket_0002").await?;
        }
        Ok(())
    }
    async fn clear_tickets(&self) -> ServiceResult<()> {
        self.call("clear_tickets").await
    }
    async fn create_category(&self, _: &Category) -> ServiceResult<()> {
        self.call("create_category").await
    }
    async fn delete_category(&self, _: &Category) -> ServiceResult<()> {
        self.call("delete_category").await
    }
    async fn create_prize(&self, name: &str, category: &Category) -> ServiceResult<Prize> {
        self.call("create_prize").await?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(Prize::new(PrizeId::new(format!("srv-{}", id)), name, category.clone()))
    }
    async fn update_prize(&self, _: &Prize) -> ServiceResult<()> {
        self.call("update_prize").await
    }
    async fn delete_prize(&self, _: &PrizeId) -> ServiceResult<()> {
        self.call("delete_prize").await
    }
    async fn mark_prize_drawn(&self, _: &PrizeId) -> ServiceResult<()> {
        self.call("mark_prize_drawn").await
    }
    async fn create_owner(&self, owner: &TicketOwner) -> ServiceResult<TicketOwner> {
        self.call("create_owner").await?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(TicketOwner {
            id: format!("emp-{}", id),
            ..owner.clone()
        })
    }
    async fn update_owner(&self, _: &TicketOwner) -> ServiceResult<()> {
        self.call("update_owner").await
    }
    async fn delete_owner(&self, id: &str) -> ServiceResult<()> {
        self.call("delete_owner").await?;
        if id == "emp-1" {
            self.call("delete_owner_emp-1").await?;
        }
        Ok(())
    }
    async fn draw(&self, _: &DrawRequest) -> ServiceResult<Vec<RemoteWinner>> {
        let delay = *self.draw_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        self.call("draw").await?;
        Ok(self.winners.lock().unwrap().clone())
    }
    async fn record_result(&self, _: &HistoryRecord) -> ServiceResult<()> {
        self.call("record_result").await
    }
    async fn clear_history(&self) -> ServiceResult<()> {
        self.call("clear_history").await
    }
}

fn cat(label: &str) -> Category {
    Category::new(label).unwrap()
}
fn ticket(number: &str) -> Ticket {
    Ticket::new(number).unwrap()
}
fn tickets(numbers: &[&str]) -> Vec<Ticket> {
    numbers.iter().map(|n| ticket(n)).collect()
}
fn prize(id: &str, name: &str, category: &str) -> Prize {
    Prize::new(PrizeId::new(id), name, cat(category))
}
fn size(n: usize) -> GroupSize {
    GroupSize::new(n).unwrap()
}

/// Pool 0001..0003, prizes P1 and P2 in category A.
fn raffle() -> Snapshot {
    Snapshot {
        tickets: tickets(&["0001", "0002", "0003"]),
        prizes: vec![prize("P1", "Bike", "A"), prize("P2", "Mug", "A")],
        ..Default::default()
    }
}
fn engine_with(service: &Arc<ScriptedService>, resolution: Resolution, snapshot: Snapshot) -> DrawEngine {
    DrawEngine::with_snapshot(service.clone(), resolution, DrawTiming::default(), snapshot)
}
fn local_engine(snapshot: Snapshot) -> (Arc<ScriptedService>, DrawEngine) {
    let service = Arc::new(ScriptedService::default());
    let engine = engine_with(&service, Resolution::Local, snapshot);
    (service, engine)
}

#[tokio::test(start_paused = true)]
async fn draw_awards_distinct_prizes() {
    let (service, engine) = local_engine(raffle());
    let results = engine.execute_draw(DrawRequest::new(cat("A"), size(2)), |_| ()).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_ne!(results[0].ticket, results[1].ticket);
    assert_ne!(results[0].prize.id, results[1].prize.id);

    let state = engine.state().await;
    assert_eq!(state.tickets.len(), 1);
    assert!(results.iter().all(|r| !state.has_ticket(&r.ticket)));
    assert!(state.prizes.iter().all(|p| p.is_assigned));
    for result in &results {
        assert_eq!(state.prize(&result.prize.id).and_then(|p| p.assigned_to.clone()), Some(result.ticket.clone()));
    }
    assert_eq!(state.current_results, results);
    assert_eq!(state.history.len(), 1);
    assert_eq!(state.history[0].results, results);
    drop(state);
    assert_eq!(service.calls("mark_prize_drawn"), 2);
    assert_eq!(service.calls("record_result"), 2);
    assert_eq!(engine.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn blocked_draw_changes_nothing() {
    let (service, engine) = local_engine(Snapshot {
        tickets: tickets(&["0001"]),
        ..raffle()
    });
    let before = engine.snapshot().await;
    assert_eq!(engine.blocking_reason(&cat("A"), size(2)).await, Some("Need 1 more tickets".to_string()));
    let results = engine.execute_draw(DrawRequest::new(cat("A"), size(2)), |_| panic!("no animation expected")).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(engine.snapshot().await, before);
    assert!(service.calls.lock().unwrap().is_empty());

    let results = engine.execute_draw(DrawRequest::new(cat("B"), size(1)), |_| ()).await.unwrap();
    assert!(results.is_empty());
    assert!(!engine.can_draw(&cat("B"), size(1)).await);
}

#[tokio::test(start_paused = true)]
async fn explicit_prize_is_honoured() {
    let (_, engine) = local_engine(Snapshot {
        prizes: vec![prize("P1", "Bike", "A"), prize("P2", "Mug", "A"), prize("P3", "Pen", "A")],
        ..raffle()
    });
    let request = DrawRequest::new(cat("A"), size(1)).with_prize(PrizeId::new("P2"));
    let results = engine.execute_draw(request, |_| ()).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].prize.id, PrizeId::new("P2"));

    let unknown = DrawRequest::new(cat("A"), size(1)).with_prize(PrizeId::new("P9"));
    assert_eq!(engine.execute_draw(unknown, |_| ()).await, Err(DrawError::UnknownPrize(PrizeId::new("P9"))));
    // The awarded prize can't be requested again
    let again = DrawRequest::new(cat("A"), size(1)).with_prize(PrizeId::new("P2"));
    assert_eq!(engine.execute_draw(again, |_| ()).await, Err(DrawError::UnknownPrize(PrizeId::new("P2"))));
    assert_eq!(engine.history().await.len(), 1);
    assert_eq!(engine.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn failed_resolution_leaves_state_untouched() {
    let service = Arc::new(ScriptedService::default());
    service.fail("draw");
    let engine = engine_with(&service, Resolution::Remote, raffle());
    let before = engine.snapshot().await;
    let res = engine.execute_draw(DrawRequest::new(cat("A"), size(1)), |_| ()).await;
    assert!(matches!(res, Err(DrawError::Service(ServiceError::Http { status: 500, .. }))));
    assert_eq!(engine.snapshot().await, before);
    assert!(engine.history().await.is_empty());
    assert!(engine.current_results().await.is_empty());
    assert_eq!(engine.phase(), Phase::Idle);
    assert_eq!(service.calls("mark_prize_drawn"), 0);
}

#[tokio::test(start_paused = true)]
async fn results_wait_for_the_animation() {
    let (_, engine) = local_engine(raffle());
    let start = Instant::now();
    let mut frames = 0;
    let results = engine.execute_draw(DrawRequest::new(cat("A"), size(2)), |preview| {
        assert_eq!(preview.len(), 2);
        frames += 1;
    }).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(start.elapsed() >= Duration::from_millis(2500));
    assert!(frames >= 30, "only {} frames", frames);
}

#[tokio::test(start_paused = true)]
async fn slow_remote_resolution_keeps_animating() {
    let service = Arc::new(ScriptedService::default());
    *service.draw_delay.lock().unwrap() = Duration::from_millis(4000);
    *service.winners.lock().unwrap() = vec![RemoteWinner {
        ticket_number: ticket("0003"),
        prize_id: PrizeId::new("P2"),
        prize_name: "Mug".to_string(),
        category: cat("A"),
    }];
    let engine = engine_with(&service, Resolution::Remote, raffle());
    let start = Instant::now();
    let mut frames = 0;
    let results = engine.execute_draw(DrawRequest::new(cat("A"), size(1)), |_| frames += 1).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(4000));
    assert!(frames >= 49, "only {} frames", frames);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].ticket, ticket("0003"));
    assert_eq!(results[0].prize.id, PrizeId::new("P2"));
    assert!(!engine.state().await.has_ticket(&ticket("0003")));
}

#[tokio::test(start_paused = true)]
async fn remote_winners_are_checked() {
    let service = Arc::new(ScriptedService::default());
    *service.winners.lock().unwrap() = vec![RemoteWinner {
        ticket_number: ticket("0404"),
        prize_id: PrizeId::new("P1"),
        prize_name: "Bike".to_string(),
        category: cat("A"),
    }];
    let engine = engine_with(&service, Resolution::Remote, raffle());
    let before = engine.snapshot().await;
    let res = engine.execute_draw(DrawRequest::new(cat("A"), size(1)), |_| ()).await;
    assert!(matches!(res, Err(DrawError::Invariant(_))));
    assert_eq!(engine.snapshot().await, before);
}

#[tokio::test(start_paused = true)]
async fn concurrent_draws_run_once() {
    let (_, engine) = local_engine(raffle());
    let (first, second) = tokio::join!(
        engine.execute_draw(DrawRequest::new(cat("A"), size(2)), |_| ()),
        engine.execute_draw(DrawRequest::new(cat("A"), size(2)), |_| ()),
    );
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(first.len() + second.len(), 2);
    assert!(first.is_empty() || second.is_empty());
    assert_eq!(engine.history().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn inventory_is_locked_while_drawing() {
    let (_, engine) = local_engine(raffle());
    let (draw, add) = tokio::join!(
        engine.execute_draw(DrawRequest::new(cat("A"), size(1)), |_| ()),
        async {
            tokio::task::yield_now().await;
            assert!(engine.is_drawing());
            engine.add_tickets(tickets(&["0100"])).await
        },
    );
    assert_eq!(draw.unwrap().len(), 1);
    assert!(matches!(add, Err(DrawError::DrawInProgress)));
    assert_eq!(engine.clear_current_results().await, Ok(()));
}

#[tokio::test(start_paused = true)]
async fn history_is_most_recent_first() {
    let (_, engine) = local_engine(raffle());
    let first = engine.execute_draw(DrawRequest::new(cat("A"), size(1)), |_| ()).await.unwrap();
    let second = engine.execute_draw(DrawRequest::new(cat("A"), size(1)), |_| ()).await.unwrap();
    let history = engine.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].results, second);
    assert_eq!(history[1].results, first);
    assert_eq!(engine.current_results().await, second);

    engine.clear_current_results().await.unwrap();
    assert!(engine.current_results().await.is_empty());
    assert_eq!(engine.history().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn settle_failure_rolls_back() {
    let (service, engine) = local_engine(raffle());
    service.fail("mark_prize_drawn");
    let before = engine.snapshot().await;
    let res = engine.execute_draw(DrawRequest::new(cat("A"), size(2)), |_| ()).await;
    assert!(matches!(res, Err(DrawError::Service(_))));
    assert_eq!(engine.snapshot().await, before);
    assert!(engine.current_results().await.is_empty());
    assert_eq!(service.calls("record_result"), 0);
    assert_eq!(engine.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn history_persistence_failure_is_tolerated() {
    let (service, engine) = local_engine(raffle());
    service.fail("record_result");
    let results = engine.execute_draw(DrawRequest::new(cat("A"), size(2)), |_| ()).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(engine.history().await.len(), 1);
    assert_eq!(service.calls("record_result"), 2);
}

#[tokio::test]
async fn reset_refetches_from_service() {
    let service = Arc::new(ScriptedService::default());
    *service.remote.lock().unwrap() = Snapshot {
        tickets: tickets(&["0009", "0009"]),
        prizes: vec![prize("P7", "Lamp", "B")],
        categories: vec![cat("B")],
        ..Default::default()
    };
    let engine = engine_with(&service, Resolution::Local, raffle());
    engine.reset_all().await.unwrap();
    assert_eq!(service.calls("clear_tickets"), 1);
    assert_eq!(service.calls("clear_history"), 1);
    let state = engine.state().await;
    assert_eq!(state.tickets, tickets(&["0009"]));
    assert_eq!(state.categories, vec![cat("B")]);
    assert!(state.history.is_empty());
    assert!(state.current_results.is_empty());
}

#[tokio::test]
async fn failed_reset_keeps_local_state() {
    let service = Arc::new(ScriptedService::default());
    service.fail("clear_tickets");
    let engine = engine_with(&service, Resolution::Local, raffle());
    assert!(engine.reset_all().await.is_err());
    assert_eq!(engine.snapshot().await, raffle());
    assert_eq!(service.calls("clear_history"), 0);
    assert_eq!(engine.phase(), Phase::Idle);
}

#[tokio::test]
async fn offline_refresh_is_skipped() {
    let engine = DrawEngine::with_snapshot(Arc::new(crate::service::OfflineService), Resolution::Local, DrawTiming::default(), raffle());
    assert_eq!(engine.refresh().await, Ok(false));
    assert_eq!(engine.snapshot().await, raffle());

    engine.reset_all().await.unwrap();
    let state = engine.state().await;
    assert!(state.tickets.is_empty());
    assert!(state.prizes.is_empty());
    assert_eq!(state.categories, Category::defaults());
}

#[tokio::test]
async fn add_tickets_reports_duplicates_and_failures() {
    let (service, engine) = local_engine(raffle());
    let AddedTickets { added, duplicates, failed } = engine.add_tickets(tickets(&["0004", "0001", "0004", "0005"])).await.unwrap();
    assert_eq!(added, tickets(&["0004", "0005"]));
    assert_eq!(duplicates, tickets(&["0001", "0004"]));
    assert!(failed.is_empty());
    assert_eq!(engine.state().await.tickets.len(), 5);

    service.fail("create_ticket");
    let report = engine.add_tickets(tickets(&["0006"])).await.unwrap();
    assert!(report.added.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert!(!engine.state().await.has_ticket(&ticket("0006")));
}

#[tokio::test]
async fn ticket_ranges() {
    let (_, engine) = local_engine(Snapshot::default());
    let report = engine.add_ticket_range(8, 12).await.unwrap();
    assert_eq!(report.added, tickets(&["8", "9", "10", "11", "12"]));
    assert!(matches!(engine.add_ticket_range(5, 4).await, Err(DrawError::InvalidInput(_))));
    assert!(matches!(engine.add_ticket_range(0, 10_001).await, Err(DrawError::InvalidInput(_))));
    assert_eq!(engine.state().await.tickets.len(), 5);
}

#[tokio::test]
async fn removed_tickets_come_back_on_failure() {
    let (service, engine) = local_engine(raffle());
    service.fail("delete_ticket_0002");
    let result = engine.remove_tickets(&tickets(&["0001", "0002"])).await.unwrap();
    assert_eq!(result.oks(), tickets(&["0001"]).as_slice());
    assert_eq!(result.errs().len(), 1);
    assert_eq!(engine.state().await.tickets, tickets(&["0002", "0003"]));
}

#[tokio::test]
async fn clear_tickets_restores_on_failure() {
    let (service, engine) = local_engine(raffle());
    service.fail("clear_tickets");
    assert!(engine.clear_tickets().await.is_err());
    assert_eq!(engine.state().await.tickets.len(), 3);
}

#[tokio::test]
async fn owner_tickets() {
    let (_, engine) = local_engine(Snapshot {
        owners: vec![
            TicketOwner { id: "1".to_string(), name: "Ada".to_string(), ticket_numbers: tickets(&["0001", "0002"]), email: None },
            TicketOwner { id: "2".to_string(), name: "Linus".to_string(), ticket_numbers: tickets(&["0002", "0003"]), email: None },
        ],
        ..raffle()
    });
    assert_eq!(engine.tickets_from_owners().await, tickets(&["0001", "0002", "0003"]));
    assert_eq!(engine.owner_of(&ticket("0003")).await.map(|o| o.name), Some("Linus".to_string()));
    assert_eq!(engine.owner_of(&ticket("0404")).await, None);
}

#[tokio::test]
async fn categories() {
    let (service, engine) = local_engine(raffle());
    assert_eq!(engine.add_category(" d ").await, Ok(cat("D")));
    assert_eq!(engine.add_category("a").await, Err(DrawError::CategoryExists(cat("A"))));
    assert!(matches!(engine.add_category("  ").await, Err(DrawError::InvalidInput(_))));
    assert_eq!(engine.delete_category(&cat("A")).await, Err(DrawError::CategoryInUse(cat("A"))));
    assert_eq!(engine.delete_category(&cat("Z")).await, Err(DrawError::UnknownCategory(cat("Z"))));

    service.fail("delete_category");
    assert!(engine.delete_category(&cat("B")).await.is_err());
    assert_eq!(engine.state().await.categories, vec![cat("A"), cat("B"), cat("C"), cat("D")]);

    service.fail("create_category");
    assert!(engine.add_category("E").await.is_err());
    assert!(!engine.state().await.categories.contains(&cat("E")));
}

#[tokio::test]
async fn prize_gets_service_id() {
    let (service, engine) = local_engine(raffle());
    let created = engine.add_prize(" Lamp ", &cat("B")).await.unwrap();
    assert_eq!(created.id, PrizeId::new("srv-0"));
    assert_eq!(created.name, "Lamp");
    let in_b = engine.prizes_by_category(&cat("B")).await;
    assert_eq!(in_b, vec![created]);
    assert!(engine.state().await.prizes.iter().all(|p| !p.id.is_temporary()));

    assert_eq!(engine.add_prize("Hat", &cat("Q")).await, Err(DrawError::UnknownCategory(cat("Q"))));
    service.fail("create_prize");
    assert!(engine.add_prize("Hat", &cat("B")).await.is_err());
    assert_eq!(engine.prizes_by_category(&cat("B")).await.len(), 1);
}

#[tokio::test]
async fn bulk_prizes() {
    let (_, engine) = local_engine(raffle());
    let result = engine.add_bulk_prizes(vec![
        ("Lamp".to_string(), cat("B")),
        ("Hat".to_string(), cat("Q")),
        ("Pen".to_string(), cat("C")),
    ]).await.unwrap();
    assert_eq!(result.oks().len(), 2);
    assert_eq!(result.errs(), &[("Hat".to_string(), DrawError::UnknownCategory(cat("Q")))]);
}

#[tokio::test(start_paused = true)]
async fn assigned_prize_is_frozen() {
    let (service, engine) = local_engine(raffle());
    let updated = engine.update_prize(&PrizeId::new("P1"), "Road bike", &cat("B")).await.unwrap();
    assert_eq!(updated.category, cat("B"));
    assert_eq!(engine.available_prizes(&cat("A")).await.len(), 1);

    service.fail("update_prize");
    assert!(engine.update_prize(&PrizeId::new("P1"), "Bike", &cat("A")).await.is_err());
    assert_eq!(engine.state().await.prize(&PrizeId::new("P1")).map(|p| p.name.clone()), Some("Road bike".to_string()));

    let results = engine.execute_draw(DrawRequest::new(cat("A"), size(1)), |_| ()).await.unwrap();
    assert_eq!(results[0].prize.id, PrizeId::new("P2"));
    assert_eq!(engine.update_prize(&PrizeId::new("P2"), "Cup", &cat("A")).await, Err(DrawError::PrizeFrozen(PrizeId::new("P2"))));
}

#[tokio::test]
async fn deleted_prize_comes_back_on_failure() {
    let (service, engine) = local_engine(raffle());
    service.fail("delete_prize");
    assert!(engine.delete_prize(&PrizeId::new("P1")).await.is_err());
    assert_eq!(engine.state().await.prizes, raffle().prizes);
    assert_eq!(engine.delete_prize(&PrizeId::new("P9")).await, Err(DrawError::UnknownPrize(PrizeId::new("P9"))));
}

#[tokio::test(start_paused = true)]
async fn draws_wait_for_pending_edits() {
    let (service, engine) = local_engine(raffle());
    service.delay("create_prize", Duration::from_millis(3000));
    service.delay("mark_prize_drawn", Duration::from_millis(1000));
    service.fail("mark_prize_drawn");
    let a = cat("A");
    let (added, drawn) = tokio::join!(
        engine.add_prize("Lamp", &a),
        async {
            tokio::task::yield_now().await;
            assert_eq!(engine.phase(), Phase::Editing);
            engine.execute_draw(DrawRequest::new(cat("A"), size(1)), |_| ()).await
        },
    );
    assert_eq!(added.unwrap().id, PrizeId::new("srv-0"));
    assert_eq!(drawn, Ok(Vec::new()));
    let state = engine.state().await;
    let ids: Vec<&str> = state.prizes.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["P1", "P2", "srv-0"]);
    assert!(state.prizes.iter().all(|p| !p.is_assigned));
    drop(state);
    assert_eq!(service.calls("mark_prize_drawn"), 0);
    assert_eq!(engine.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn edits_overlap_but_exclude_syncs() {
    let (service, engine) = local_engine(raffle());
    service.delay("create_prize", Duration::from_millis(1000));
    let b = cat("B");
    let (prize, added, refreshed) = tokio::join!(
        engine.add_prize("Lamp", &b),
        engine.add_tickets(tickets(&["0004"])),
        async {
            tokio::task::yield_now().await;
            engine.refresh().await
        },
    );
    assert!(prize.is_ok());
    assert_eq!(added.unwrap().added, tickets(&["0004"]));
    assert_eq!(refreshed, Err(DrawError::DrawInProgress));
    assert_eq!(service.calls("fetch_tickets"), 0);
    assert_eq!(engine.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn dropped_draw_stops_and_changes_nothing() {
    let (service, engine) = local_engine(raffle());
    let frames = Arc::new(AtomicUsize::new(0));
    let counter = frames.clone();
    let draw = engine.execute_draw(DrawRequest::new(cat("A"), size(2)), move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert!(tokio::time::timeout(Duration::from_millis(500), draw).await.is_err());
    let at_drop = frames.load(Ordering::SeqCst);
    assert!(at_drop > 0);
    assert_eq!(engine.phase(), Phase::Idle);

    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert_eq!(frames.load(Ordering::SeqCst), at_drop);
    assert_eq!(engine.snapshot().await, raffle());
    assert!(engine.current_results().await.is_empty());
    assert_eq!(service.calls("mark_prize_drawn"), 0);

    let results = engine.execute_draw(DrawRequest::new(cat("A"), size(1)), |_| ()).await.unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropped_settle_still_reaches_the_service() {
    let (service, engine) = local_engine(raffle());
    service.delay("mark_prize_drawn", Duration::from_millis(1000));
    let draw = engine.execute_draw(DrawRequest::new(cat("A"), size(1)), |_| ());
    // Dropped at 3000 ms: after the animation, while the prize is being marked
    assert!(tokio::time::timeout(Duration::from_millis(3000), draw).await.is_err());
    assert_eq!(engine.phase(), Phase::Idle);

    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert_eq!(service.calls("mark_prize_drawn"), 1);
    assert_eq!(service.calls("record_result"), 1);
    let state = engine.state().await;
    assert_eq!(state.tickets.len(), 2);
    assert_eq!(state.history.len(), 1);
    assert_eq!(state.prizes.iter().filter(|p| p.is_assigned).count(), 1);
}

#[tokio::test]
async fn owners_crud() {
    let (service, engine) = local_engine(raffle());
    let ada = engine.add_owner(" Ada ", Some("ada@example.com"), tickets(&["0001", "0001", "0002"])).await.unwrap();
    assert_eq!(ada.id, "emp-0");
    assert_eq!(ada.name, "Ada");
    assert_eq!(ada.ticket_numbers, tickets(&["0001", "0002"]));
    assert!(matches!(engine.add_owner(" ", None, vec![]).await, Err(DrawError::InvalidInput(_))));

    let updated = engine.update_owner("emp-0", "Ada L.", tickets(&["0003"])).await.unwrap();
    assert_eq!(updated.email.as_deref(), Some("ada@example.com"));
    assert_eq!(engine.owner_of(&ticket("0003")).await.map(|o| o.name), Some("Ada L.".to_string()));
    assert_eq!(engine.update_owner("emp-9", "Linus", vec![]).await, Err(DrawError::UnknownOwner("emp-9".to_string())));

    service.fail("update_owner");
    assert!(engine.update_owner("emp-0", "Nobody", vec![]).await.is_err());
    assert_eq!(engine.owners().await, vec![updated]);

    service.fail("delete_owner");
    assert!(engine.delete_owner("emp-0").await.is_err());
    assert_eq!(engine.owners().await.len(), 1);
}

#[tokio::test]
async fn bulk_owners_and_clear() {
    let (service, engine) = local_engine(raffle());
    let result = engine.add_bulk_owners(vec![
        ("Ada".to_string(), tickets(&["0001"])),
        (" ".to_string(), tickets(&["0003"])),
        ("Linus".to_string(), tickets(&["0002"])),
    ]).await.unwrap();
    assert_eq!(result.oks().len(), 2);
    assert_eq!(result.errs().len(), 1);
    assert_eq!(engine.tickets_from_owners().await, tickets(&["0001", "0002"]));

    service.fail("delete_owner_emp-1");
    let cleared = engine.clear_owners().await.unwrap();
    assert_eq!(cleared.oks().iter().map(|o| o.name.as_str()).collect::<Vec<_>>(), vec!["Ada"]);
    let kept = engine.owners().await;
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].name, "Linus");
}
