use std::cell::RefCell;
use std::rc::Rc;

use super::fakes::{recent_task, thumbnail};
use super::fixture::Fixture;
use crate::executor::BackgroundExecutor;
use crate::system::os::{
    GroupedRecentTaskInfo, RecentTaskInfo, RunningTaskInfo, TaskId, ThumbnailData, UserId,
};
use crate::tasks::{Task, TaskKey, TaskVisualsChangeListener, TrimMemoryLevel};

/// Two recent tasks, 7 being the most recent.
fn fixture_with_tasks() -> Fixture {
    let mut f = Fixture::new();
    f.os.system_ui.set_recent_tasks(vec![
        GroupedRecentTaskInfo::Single(recent_task(7, "com.example.mail", 200)),
        GroupedRecentTaskInfo::Single(recent_task(9, "com.example.maps", 100)),
    ]);
    f.service.model_notifier().on_recent_tasks_changed();
    f.dispatch();
    f.log.take();
    f
}

fn task_ids(f: &mut Fixture) -> Rc<RefCell<Option<Vec<TaskId>>>> {
    let ids = Rc::new(RefCell::new(None));
    let sink = ids.clone();
    f.service.model().get_tasks(move |tasks| {
        *sink.borrow_mut() = Some(tasks.iter().map(|t| t.task1.key.id).collect());
    });
    ids
}

#[test]
fn tasks_load_once_per_change() {
    let mut f = fixture_with_tasks();
    assert_eq!(f.service.model().task_list().change_id(), 2);

    let ids = task_ids(&mut f);
    // Callbacks always run on a later loop turn.
    assert_eq!(*ids.borrow(), None);
    f.dispatch();
    assert_eq!(*ids.borrow(), Some(vec![9, 7]));
    assert_eq!(f.log.count("sysui.recent_tasks"), 1);

    let ids = task_ids(&mut f);
    f.dispatch();
    assert_eq!(*ids.borrow(), Some(vec![9, 7]));
    assert_eq!(f.log.count("sysui.recent_tasks"), 1);

    assert!(f.service.model().is_task_list_valid(2));
    f.service.model_notifier().on_recent_tasks_changed();
    f.dispatch();
    assert!(!f.service.model().is_task_list_valid(2));

    let ids = task_ids(&mut f);
    f.dispatch();
    assert_eq!(*ids.borrow(), Some(vec![9, 7]));
    assert_eq!(f.log.count("sysui.recent_tasks"), 2);
}

#[test]
fn requests_during_a_load_share_it() {
    let executor = BackgroundExecutor::queued();
    let mut f = Fixture::with_executor(executor.clone());
    f.os.system_ui.set_recent_tasks(vec![
        GroupedRecentTaskInfo::Single(recent_task(7, "com.example.mail", 200)),
        GroupedRecentTaskInfo::Single(recent_task(9, "com.example.maps", 100)),
    ]);
    f.service.model_notifier().on_recent_tasks_changed();
    f.dispatch();
    executor.run_pending();
    f.dispatch();
    f.log.take();

    let first = task_ids(&mut f);
    let second = task_ids(&mut f);
    assert!(f.service.model().task_list().is_loading_tasks_in_background());
    assert_eq!(f.log.count("sysui.recent_tasks"), 0);

    assert_eq!(executor.run_pending(), 2);
    f.dispatch();
    assert_eq!(f.log.count("sysui.recent_tasks"), 1);
    assert_eq!(*first.borrow(), Some(vec![9, 7]));
    assert_eq!(*second.borrow(), Some(vec![9, 7]));
    assert!(!f.service.model().task_list().is_loading_tasks_in_background());
}

#[test]
fn find_task_by_id() {
    let mut f = fixture_with_tasks();

    let found: Rc<RefCell<Vec<Option<TaskKey>>>> = Rc::default();
    for task_id in [9, 42] {
        let sink = found.clone();
        f.service
            .model()
            .find_task_with_id(task_id, move |key| sink.borrow_mut().push(key));
    }
    f.dispatch();

    let found = found.borrow();
    assert_eq!(found.len(), 2);
    let key = found[0].as_ref().unwrap();
    assert_eq!(key.id, 9);
    assert_eq!(key.package(), Some("com.example.maps"));
    assert_eq!(found[1], None);
}

#[test]
fn dump() {
    let mut f = fixture_with_tasks();
    let _ids = task_ids(&mut f);
    f.dispatch();

    let mut out = String::new();
    f.service.model().dump("", &mut out).unwrap();
    insta::assert_snapshot!(out, @r"
    RecentTasksList:
      mChangeId=2
      mResultsUi=[id=2, tasks=
        t1=9 t2=-1
        t1=7 t2=-1
      ]
      rawTasks=[
        t1=7 t2=-1
        t1=9 t2=-1
      ]
    ");
}

struct RecordingListener {
    name: &'static str,
    events: Rc<RefCell<Vec<String>>>,
}

impl TaskVisualsChangeListener for RecordingListener {
    fn on_task_thumbnail_changed(&mut self, task_id: TaskId, _thumbnail: &ThumbnailData) {
        self.events
            .borrow_mut()
            .push(format!("{}: thumbnail {task_id}", self.name));
    }

    fn on_task_icon_changed(&mut self, package: &str, user_id: UserId) {
        self.events
            .borrow_mut()
            .push(format!("{}: icon {package} {user_id}", self.name));
    }
}

#[test]
fn visuals_listeners_hear_newest_first() {
    let mut f = fixture_with_tasks();
    let events: Rc<RefCell<Vec<String>>> = Rc::default();

    let first: Rc<RefCell<dyn TaskVisualsChangeListener>> =
        Rc::new(RefCell::new(RecordingListener {
            name: "first",
            events: events.clone(),
        }));
    let second: Rc<RefCell<dyn TaskVisualsChangeListener>> =
        Rc::new(RefCell::new(RecordingListener {
            name: "second",
            events: events.clone(),
        }));
    f.service.model().add_visuals_change_listener(first.clone());
    f.service.model().add_visuals_change_listener(second);

    let notifier = f.service.model_notifier();
    notifier.on_task_snapshot_changed(7, thumbnail(false));
    notifier.on_package_icon_changed("com.example.mail", 0);
    f.dispatch();
    assert_eq!(
        *events.borrow(),
        [
            "second: thumbnail 7",
            "first: thumbnail 7",
            "second: icon com.example.mail 0",
            "first: icon com.example.mail 0",
        ]
    );

    events.borrow_mut().clear();
    f.service.model().remove_visuals_change_listener(&first);
    notifier.on_task_snapshot_changed(9, thumbnail(false));
    f.dispatch();
    assert_eq!(*events.borrow(), ["second: thumbnail 9"]);
}

fn task(info: &RecentTaskInfo) -> Task {
    Task::from_info(info, false)
}

#[test]
fn thumbnails_are_cached_until_memory_runs_low() {
    let mut f = fixture_with_tasks();
    let task = task(&recent_task(7, "com.example.mail", 200));

    let loaded: Rc<RefCell<Vec<ThumbnailData>>> = Rc::default();
    let sink = loaded.clone();
    let handle = f
        .service
        .model()
        .thumbnail_cache()
        .update_thumbnail_in_background(&task, move |t| sink.borrow_mut().push(t));
    assert!(handle.is_some());
    f.dispatch();
    assert_eq!(loaded.borrow().len(), 1);
    assert!(loaded.borrow()[0].reduced_resolution);
    assert_eq!(f.log.matching("am.task_thumbnail"), ["am.task_thumbnail(7, true)"]);

    // Served from the cache without a load.
    let sink = loaded.clone();
    let handle = f
        .service
        .model()
        .thumbnail_cache()
        .update_thumbnail_in_background(&task, move |t| sink.borrow_mut().push(t));
    assert!(handle.is_none());
    assert_eq!(loaded.borrow().len(), 2);

    f.service
        .model_notifier()
        .on_trim_memory(TrimMemoryLevel::RunningCritical);
    f.dispatch();

    let sink = loaded.clone();
    let handle = f
        .service
        .model()
        .thumbnail_cache()
        .update_thumbnail_in_background(&task, move |t| sink.borrow_mut().push(t));
    assert!(handle.is_some());
    f.dispatch();
    assert_eq!(f.log.count("am.task_thumbnail(7, true)"), 2);
}

#[test]
fn cancelled_thumbnail_load_never_calls_back() {
    let mut f = fixture_with_tasks();
    let task = task(&recent_task(9, "com.example.maps", 100));

    let called = Rc::new(RefCell::new(false));
    let sink = called.clone();
    let handle = f
        .service
        .model()
        .thumbnail_cache()
        .update_thumbnail_in_background(&task, move |_| *sink.borrow_mut() = true);
    handle.unwrap().cancel();
    f.dispatch();
    assert!(!*called.borrow());
}

#[test]
fn task_stack_changes_preload_thumbnails_while_visible() {
    let mut f = fixture_with_tasks();
    let notifier = f.service.model_notifier();

    notifier.on_task_stack_changed();
    f.dispatch();
    assert!(f.log.matching("am.task_thumbnail").is_empty());

    f.service
        .model()
        .thumbnail_cache()
        .high_res_loading_state()
        .set_visible(true);
    notifier.on_task_stack_changed();
    f.dispatch();
    let mut loads = f.log.matching("am.task_thumbnail");
    loads.sort();
    assert_eq!(loads, ["am.task_thumbnail(7, true)", "am.task_thumbnail(9, true)"]);

    f.log.take();
    notifier.on_trim_memory(TrimMemoryLevel::UiHidden);
    notifier.on_task_stack_changed();
    f.dispatch();
    assert!(f.log.matching("am.task_thumbnail").is_empty());
}

#[test]
fn running_task_preload_skips_the_running_task() {
    let mut f = fixture_with_tasks();
    f.os.activity_manager
        .set_running_task(Some(RunningTaskInfo::new(7, None)));

    f.service
        .model()
        .thumbnail_cache()
        .high_res_loading_state()
        .set_visible(true);
    f.service.model_notifier().on_task_stack_changed();
    f.dispatch();
    assert_eq!(f.log.matching("am.task_thumbnail"), ["am.task_thumbnail(9, true)"]);
}

#[test]
fn icon_content_description_is_badged_for_other_users() {
    let mut f = fixture_with_tasks();
    f.os.icon_loader
        .accessibility_enabled
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let mut work = recent_task(11, "com.example.mail", 300);
    work.user_id = 10;
    work.label = Some("Inbox".to_owned());
    let mut own = recent_task(7, "com.example.mail", 200);
    own.label = Some("com.example.mail".to_owned());

    let descriptions: Rc<RefCell<Vec<String>>> = Rc::default();
    for info in [&work, &own] {
        let sink = descriptions.clone();
        f.service
            .model()
            .icon_cache()
            .update_icon_in_background(&task(info), move |entry| {
                sink.borrow_mut().push(entry.content_description)
            });
    }
    f.dispatch();

    assert_eq!(
        *descriptions.borrow(),
        ["Work(10) com.example.mail Inbox", "com.example.mail"]
    );
    assert_eq!(f.service.model().icon_cache().cached_len(), 2);

    // Changing the icon of a package only drops that user's entries.
    f.service
        .model_notifier()
        .on_package_icon_changed("com.example.mail", 10);
    f.dispatch();
    assert_eq!(f.service.model().icon_cache().cached_len(), 1);
}

#[test]
fn missing_activity_icon_falls_back_to_default() {
    let mut f = fixture_with_tasks();

    let icons = Rc::new(RefCell::new(0));
    for task_id in [20, 21] {
        let sink = icons.clone();
        f.service.model().icon_cache().update_icon_in_background(
            &task(&recent_task(task_id, "no.icon", 0)),
            move |entry| {
                assert!(entry.content_description.is_empty());
                *sink.borrow_mut() += 1;
            },
        );
    }
    f.dispatch();

    assert_eq!(*icons.borrow(), 2);
    // The default icon is loaded once per user.
    assert_eq!(f.log.count("icons.default_icon(0)"), 1);
}

#[test]
fn running_tasks_track_appear_and_vanish() {
    let mut f = fixture_with_tasks();
    let notified = Rc::new(RefCell::new(Vec::new()));
    let sink = notified.clone();
    f.service
        .model()
        .task_list()
        .set_running_tasks_listener(move |tasks| {
            sink.borrow_mut()
                .push(tasks.iter().map(|t| t.task_id).collect::<Vec<_>>())
        });

    let notifier = f.service.model_notifier();
    notifier.on_running_task_appeared(RunningTaskInfo::new(4, None));
    notifier.on_running_task_appeared(RunningTaskInfo::new(4, None));
    notifier.on_running_task_appeared(RunningTaskInfo::new(6, None));
    notifier.on_running_task_vanished(RunningTaskInfo::new(4, None));
    notifier.on_running_task_vanished(RunningTaskInfo::new(8, None));
    f.dispatch();

    assert_eq!(*notified.borrow(), [vec![4], vec![4, 6], vec![6]]);
    let running: Vec<_> = f
        .service
        .model()
        .task_list()
        .running_tasks()
        .iter()
        .map(|t| t.task_id)
        .collect();
    assert_eq!(running, [6]);
}

#[test]
fn removed_task_leaves_the_caches() {
    let mut f = fixture_with_tasks();
    let info = recent_task(9, "com.example.maps", 100);
    f.service
        .model()
        .icon_cache()
        .update_icon_in_background(&task(&info), |_| ());
    f.dispatch();
    assert_eq!(f.service.model().icon_cache().cached_len(), 1);

    f.service.model_notifier().on_task_removed(9);
    f.dispatch();
    assert_eq!(f.service.model().icon_cache().cached_len(), 0);
}
