// src/kernel/sched/mod.rs

//! The per-CPU round-robin scheduler (§4.3).

use crate::kernel::cpu::{CpuId, CpuTable};
use crate::kernel::env::{EnvId, EnvStatus, EnvTable, EnvType};
use crate::kernel::mm::PagingBackend;

/// What the scheduler decided for this CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Resume this environment (it may already have been `Running`, or
    /// may be newly dispatched).
    Resume(EnvId),
    /// No non-idle environment is runnable or running anywhere; the
    /// caller should enter the diagnostic monitor instead of resuming
    /// anything (§4.3 step 7).
    NoRunnableEnvironments,
}

/// Picks the next environment to run on `cpu`, per the seven-step
/// algorithm of §4.3. Mutates `envs`/`cpus` to reflect the dispatch
/// (status transitions, `curenv`) but does not itself perform a context
/// switch; that is the caller's concern.
pub fn schedule<P: PagingBackend>(
    envs: &mut EnvTable<P>,
    cpus: &mut CpuTable,
    cpu: CpuId,
) -> Decision {
    let n = envs.capacity();
    let self_idx = cpu.index();
    let cur = cpus.get(cpu).and_then(|c| c.curenv);
    let start = cur.map(|id| id.slot()).unwrap_or(self_idx);

    // Mirrors the original's `env_run`: the environment we are preempting
    // off this CPU goes back to Runnable before we pick its successor, so
    // it is eligible to be dispatched again later.
    if let Some(id) = cur {
        if let Ok(env) = envs.get_mut(id) {
            if env.status.running_cpu() == Some(self_idx) {
                env.status = EnvStatus::Runnable;
            }
        }
    }

    for step in 1..=n {
        let i = (start + step) % n;
        if i == start {
            break;
        }
        if dispatch_if_runnable(envs, cpus, cpu, i) {
            return Decision::Resume(cpus.get(cpu).unwrap().curenv.unwrap());
        }
    }
    // start itself might be runnable (wrap landed back exactly on it,
    // or n == 1); check it directly too.
    if dispatch_if_runnable(envs, cpus, cpu, start) {
        return Decision::Resume(cpus.get(cpu).unwrap().curenv.unwrap());
    }

    // §4.3 step 6: fall back to this CPU's idle environment. If even that
    // is not runnable or running, there is nothing left to resume on this
    // CPU; enter the diagnostic monitor (§4.3 step 7) instead of looping.
    let idle_slot = CpuTable::idle_slot_for(cpu);
    if let Some(env) = envs.iter().find(|e| e.id.slot() == idle_slot) {
        let runnable_or_running = env.status.is_runnable() || env.status.running_cpu().is_some();
        if runnable_or_running && matches!(env.env_type, EnvType::Idle) {
            let id = env.id;
            dispatch(envs, cpus, cpu, id);
            return Decision::Resume(id);
        }
    }

    Decision::NoRunnableEnvironments
}

fn dispatch_if_runnable<P: PagingBackend>(
    envs: &mut EnvTable<P>,
    cpus: &mut CpuTable,
    cpu: CpuId,
    slot: usize,
) -> bool {
    let Some(env) = envs.iter().find(|e| e.id.slot() == slot) else {
        return false;
    };
    // §4.3 step 3: skip idle-typed environments and anything not Runnable.
    if matches!(env.env_type, EnvType::Idle) || !env.status.is_runnable() {
        return false;
    }
    let id = env.id;
    dispatch(envs, cpus, cpu, id);
    true
}

fn dispatch<P: PagingBackend>(envs: &mut EnvTable<P>, cpus: &mut CpuTable, cpu: CpuId, id: EnvId) {
    if let Ok(env) = envs.get_mut(id) {
        env.status = EnvStatus::Running { cpu: cpu.index() };
    }
    if let Some(state) = cpus.get_mut(cpu) {
        state.curenv = Some(id);
    }
}

#[cfg(all(test, feature = "std-tests"))]
mod tests {
    use super::*;
    use crate::kernel::mm::mock::MockBackend;

    fn setup(n_cpus: usize) -> (EnvTable<MockBackend>, CpuTable) {
        (EnvTable::new(), CpuTable::new(n_cpus))
    }

    #[test]
    fn round_robin_visits_every_runnable_environment() {
        let (mut envs, mut cpus) = setup(1);
        let cpu = CpuId::new(0);
        let ids: alloc::vec::Vec<_> = (0..3)
            .map(|_| envs.alloc(EnvId::ZERO, EnvType::User).unwrap())
            .collect();
        for &id in &ids {
            envs.get_mut(id).unwrap().status = EnvStatus::Runnable;
        }

        // `schedule()` itself demotes the outgoing `curenv` back to
        // `Runnable`, so no manual reset between calls is needed here.
        let mut seen = alloc::vec::Vec::new();
        for _ in 0..ids.len() {
            match schedule(&mut envs, &mut cpus, cpu) {
                Decision::Resume(id) => seen.push(id),
                Decision::NoRunnableEnvironments => panic!("expected a runnable environment"),
            }
        }
        assert_eq!(seen.len(), 3);
        for id in &ids {
            assert!(seen.contains(id), "round-robin skipped {id}");
        }
    }

    #[test]
    fn running_env_is_demoted_to_runnable_and_revisited_next_lap() {
        let (mut envs, mut cpus) = setup(1);
        let cpu = CpuId::new(0);
        let ids: alloc::vec::Vec<_> = (0..3)
            .map(|_| envs.alloc(EnvId::ZERO, EnvType::User).unwrap())
            .collect();
        for &id in &ids {
            envs.get_mut(id).unwrap().status = EnvStatus::Runnable;
        }

        let mut order = alloc::vec::Vec::new();
        for _ in 0..6 {
            match schedule(&mut envs, &mut cpus, cpu) {
                Decision::Resume(id) => order.push(id),
                Decision::NoRunnableEnvironments => panic!("expected a runnable environment"),
            }
        }
        assert_eq!(order[0], order[3], "scheduler must revisit the same environment every third dispatch");
        assert_eq!(order[1], order[4]);
        assert_eq!(order[2], order[5]);
        // every environment dispatched earlier than the current one was
        // demoted to Runnable, never left stuck Running on this CPU.
        let current = *order.last().unwrap();
        for &id in &ids {
            if id == current {
                assert!(envs.get(id).unwrap().status.running_cpu().is_some());
            } else {
                assert!(envs.get(id).unwrap().status.is_runnable());
            }
        }
    }

    #[test]
    fn scheduler_never_dispatches_idle_typed_environment_from_main_loop() {
        let (mut envs, mut cpus) = setup(1);
        let cpu = CpuId::new(0);
        let idle = envs.alloc(EnvId::ZERO, EnvType::Idle).unwrap();
        envs.get_mut(idle).unwrap().status = EnvStatus::Runnable;
        let user = envs.alloc(EnvId::ZERO, EnvType::User).unwrap();
        envs.get_mut(user).unwrap().status = EnvStatus::Runnable;

        match schedule(&mut envs, &mut cpus, cpu) {
            Decision::Resume(id) => assert_eq!(id, user),
            Decision::NoRunnableEnvironments => panic!("user environment should have been picked"),
        }
    }

    #[test]
    fn no_runnable_falls_back_to_this_cpus_idle_slot() {
        let (mut envs, mut cpus) = setup(1);
        let cpu = CpuId::new(0);
        // Slot 0 is this CPU's idle slot.
        let idle = envs.alloc(EnvId::ZERO, EnvType::Idle).unwrap();
        assert_eq!(idle.slot(), CpuTable::idle_slot_for(cpu));
        envs.get_mut(idle).unwrap().status = EnvStatus::Runnable;

        match schedule(&mut envs, &mut cpus, cpu) {
            Decision::Resume(id) => assert_eq!(id, idle),
            Decision::NoRunnableEnvironments => panic!("idle fallback should have fired"),
        }
    }
}
