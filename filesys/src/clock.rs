//! # 二次机会（时钟）淘汰
//!
//! 游标环绕扫描所有条目：引用位为假的条目即为牺牲者；
//! 引用位为真则清除该位并前进。最坏两圈内必然选出牺牲者。
//!
//! 该策略只依赖 [`Referenced`]，块缓存与其它需要近似 LRU 的地方都可复用。

/// 带有引用位的可淘汰条目
pub trait Referenced {
    fn referenced(&self) -> bool;
    fn set_referenced(&mut self, referenced: bool);
}

#[derive(Debug, Default, Clone)]
pub struct Clock {
    hand: usize,
}

impl Clock {
    pub const fn new() -> Self {
        Self { hand: 0 }
    }

    /// 当前游标位置
    #[inline]
    pub fn hand(&self) -> usize {
        self.hand
    }

    /// 选出牺牲者的下标，游标停在牺牲者之后
    pub fn select_victim<T: Referenced>(&mut self, entries: &mut [T]) -> usize {
        assert!(!entries.is_empty(), "clock over an empty set");

        loop {
            let index = self.hand % entries.len();
            self.hand = (index + 1) % entries.len();

            let entry = &mut entries[index];
            if !entry.referenced() {
                return index;
            }
            entry.set_referenced(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Page(bool);

    impl Referenced for Page {
        fn referenced(&self) -> bool {
            self.0
        }

        fn set_referenced(&mut self, referenced: bool) {
            self.0 = referenced;
        }
    }

    #[test]
    fn all_referenced_falls_back_to_hand() {
        let mut pages = [Page(true), Page(true), Page(true)];
        let mut clock = Clock::new();

        assert_eq!(clock.select_victim(&mut pages), 0);
        assert_eq!(clock.hand(), 1);
        assert!(pages.iter().all(|page| !page.0));
    }

    #[test]
    fn referenced_entry_gets_second_chance() {
        let mut pages = [Page(false), Page(true), Page(false)];
        let mut clock = Clock::new();

        assert_eq!(clock.select_victim(&mut pages), 0);
        // 1 号被访问过，清位后跳过
        assert_eq!(clock.select_victim(&mut pages), 2);
        assert!(!pages[1].0);
        assert_eq!(clock.select_victim(&mut pages), 0);
    }
}
