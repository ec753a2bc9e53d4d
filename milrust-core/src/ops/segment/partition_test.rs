#[cfg(test)]
mod tests {
    use crate::error::MilRustError;
    use crate::ops::segment::partition::BagPartition;

    #[test]
    fn test_new_valid() -> Result<(), MilRustError> {
        let bags = BagPartition::new(vec![0..2, 2..3, 3..6])?;
        assert_eq!(bags.num_bags(), 3);
        assert_eq!(bags.lengths(), [2, 1, 3]);
        assert_eq!(bags.max_len(), 3);
        assert_eq!(bags.span(), 6);
        assert_eq!(bags.range(1), 2..3);
        Ok(())
    }

    #[test]
    fn test_from_lengths() -> Result<(), MilRustError> {
        let bags = BagPartition::from_lengths(&[2, 1, 3])?;
        assert_eq!(bags.ranges(), [0..2, 2..3, 3..6]);
        assert_eq!(bags.max_len(), 3);
        Ok(())
    }

    #[test]
    fn test_empty_partition_is_valid() -> Result<(), MilRustError> {
        let bags = BagPartition::new(vec![])?;
        assert_eq!(bags.num_bags(), 0);
        assert_eq!(bags.max_len(), 0);
        assert_eq!(bags.span(), 0);
        Ok(())
    }

    #[test]
    fn test_empty_bag_rejected() {
        let result = BagPartition::new(vec![0..2, 2..2, 2..4]);
        assert_eq!(result.err(), Some(MilRustError::EmptyBag { bag_index: 1 }));

        let result = BagPartition::from_lengths(&[1, 0, 2]);
        assert_eq!(result.err(), Some(MilRustError::EmptyBag { bag_index: 1 }));
    }

    #[test]
    fn test_reversed_range_rejected() {
        let result = BagPartition::new(vec![3..1]);
        assert_eq!(result.err(), Some(MilRustError::EmptyBag { bag_index: 0 }));
    }

    #[test]
    fn test_overlapping_bags_rejected() {
        let result = BagPartition::new(vec![0..3, 2..5]);
        assert_eq!(
            result.err(),
            Some(MilRustError::UnorderedBags {
                bag_index: 1,
                start: 2,
                end: 5,
                prev_end: 3,
            })
        );
    }

    #[test]
    fn test_out_of_order_bags_rejected() {
        let result = BagPartition::new(vec![2..4, 0..2]);
        assert!(matches!(
            result,
            Err(MilRustError::UnorderedBags { bag_index: 1, .. })
        ));
    }

    #[test]
    fn test_gaps_between_bags_allowed() -> Result<(), MilRustError> {
        // Bags may index a strict subset of the instance axis.
        let bags = BagPartition::new(vec![0..2, 4..6])?;
        assert_eq!(bags.num_bags(), 2);
        assert_eq!(bags.span(), 6);
        Ok(())
    }

    #[test]
    fn test_check_instances() -> Result<(), MilRustError> {
        let bags = BagPartition::new(vec![0..2, 2..5])?;
        assert!(bags.check_instances(5).is_ok());
        assert!(bags.check_instances(10).is_ok());
        assert_eq!(
            bags.check_instances(4).err(),
            Some(MilRustError::BagOutOfBounds {
                bag_index: 1,
                end: 5,
                ninstances: 4,
            })
        );
        Ok(())
    }

    #[test]
    fn test_round_enumeration() -> Result<(), MilRustError> {
        let bags = BagPartition::new(vec![0..2, 2..3, 3..6])?;

        // Round 0: every bag is active, representative = first column.
        let round0: Vec<(usize, usize)> = bags.round(0).collect();
        assert_eq!(round0, vec![(0, 0), (1, 2), (2, 3)]);

        // Round 1: the length-1 bag has dropped out.
        let round1: Vec<(usize, usize)> = bags.round(1).collect();
        assert_eq!(round1, vec![(0, 1), (2, 4)]);

        // Round 2: only the longest bag remains.
        let round2: Vec<(usize, usize)> = bags.round(2).collect();
        assert_eq!(round2, vec![(2, 5)]);

        // Past max_len, no bag is active.
        assert_eq!(bags.round(3).count(), 0);
        Ok(())
    }

    #[test]
    fn test_every_column_is_representative_exactly_once() -> Result<(), MilRustError> {
        let bags = BagPartition::from_lengths(&[3, 1, 4, 2])?;
        let mut seen = vec![0usize; bags.span()];
        for r in 0..bags.max_len() {
            for (_, col) in bags.round(r) {
                seen[col] += 1;
            }
        }
        assert!(seen.iter().all(|&count| count == 1));
        Ok(())
    }

    #[test]
    fn test_bags_by_len() -> Result<(), MilRustError> {
        let bags = BagPartition::from_lengths(&[2, 3, 2, 1])?;
        let groups = bags.bags_by_len();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[&1], vec![3]);
        assert_eq!(groups[&2], vec![0, 2]);
        assert_eq!(groups[&3], vec![1]);
        Ok(())
    }
}
