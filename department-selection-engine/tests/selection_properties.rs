use department_selection_engine::{
    validate_selection, CategoryEntry, CategoryId, CategoryTally, DepartmentEntry, DepartmentId,
    Directory, GlobalLimit, SelectionLimit, SelectionState,
};
use proptest::prelude::*;
use proptest::test_runner::Config;

/// Two categories (limits 1 and 2) with three departments each, plus three
/// uncategorized departments. Ids run from 1 to 9.
fn directory(first_limit: u32, second_limit: u32) -> Directory {
    let departments = |ids: core::ops::RangeInclusive<i32>| {
        ids.map(|id| DepartmentEntry {
            id: DepartmentId(id),
            name: format!("department {id}"),
        })
        .collect::<Vec<_>>()
    };
    Directory::new(
        vec![
            CategoryEntry {
                id: CategoryId(1),
                name: "Music".to_owned(),
                max_selections: SelectionLimit::new(first_limit).unwrap(),
                departments: departments(1..=3),
            },
            CategoryEntry {
                id: CategoryId(2),
                name: "Outreach".to_owned(),
                max_selections: SelectionLimit::new(second_limit).unwrap(),
                departments: departments(4..=6),
            },
        ],
        departments(7..=9),
    )
}

fn toggles() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec(1_i32..=10, 0..40)
}

proptest! {
    #![proptest_config(Config::with_cases(256))]

    #[test]
    fn toggling_never_breaks_limits(max in 1_u32..=6, sequence in toggles()) {
        let directory = directory(1, 2);
        let mut state = SelectionState::new(directory.clone(), GlobalLimit::new(max).unwrap());
        for id in sequence {
            state.toggle(DepartmentId(id));
            prop_assert!(state.chosen().len() <= max as usize);
            let tally = CategoryTally::new(&directory, state.chosen());
            for category in directory.categories() {
                prop_assert!(tally.count(category.id) <= category.max_selections.as_usize());
            }
        }
    }

    #[test]
    fn reachable_states_pass_the_validator(max in 1_u32..=6, sequence in toggles()) {
        let directory = directory(1, 2);
        let limit = GlobalLimit::new(max).unwrap();
        let mut state = SelectionState::new(directory.clone(), limit);
        for id in sequence {
            state.toggle(DepartmentId(id));
        }
        if !state.chosen().is_empty() {
            prop_assert_eq!(validate_selection(&directory, limit, state.chosen()), Ok(()));
        }
    }

    #[test]
    fn toggling_twice_is_a_no_op(sequence in toggles(), extra in 1_i32..=9) {
        let mut state = SelectionState::new(directory(1, 2), GlobalLimit::new(4).unwrap());
        for id in sequence {
            state.toggle(DepartmentId(id));
        }
        let before = state.chosen().to_vec();
        if before.contains(&DepartmentId(extra)) || state.is_selectable(DepartmentId(extra)) {
            state.toggle(DepartmentId(extra));
            state.toggle(DepartmentId(extra));
            let mut after = state.chosen().to_vec();
            let mut expected = before.clone();
            // reselecting appends at the end
            after.sort();
            expected.sort();
            prop_assert_eq!(after, expected);
        }
    }

    #[test]
    fn selectable_means_toggle_appends(sequence in toggles(), extra in 1_i32..=10) {
        let mut state = SelectionState::new(directory(1, 2), GlobalLimit::new(3).unwrap());
        for id in sequence {
            state.toggle(DepartmentId(id));
        }
        let department = DepartmentId(extra);
        if !state.is_chosen(department) && state.is_selectable(department) {
            state.toggle(department);
            prop_assert_eq!(state.chosen().last(), Some(&department));
        }
    }
}
